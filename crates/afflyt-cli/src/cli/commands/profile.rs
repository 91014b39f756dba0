//! Profile command handlers.

use afflyt_core::api::{User, UserUpdate};
use afflyt_core::config::Config;
use anyhow::{Context, Result};

use super::{open_session, require_user};

pub async fn show(config: &Config, json: bool) -> Result<()> {
    let session = open_session(config).await?;
    let user = require_user(&session, config)?;

    if json {
        let rendered = serde_json::to_string_pretty(&user).context("serialize profile")?;
        println!("{rendered}");
    } else {
        print_user(&user);
    }
    Ok(())
}

pub async fn update(
    config: &Config,
    name: Option<String>,
    amazon_tag: Option<String>,
    website: Option<String>,
) -> Result<()> {
    let update = UserUpdate {
        name,
        amazon_associate_tag: amazon_tag,
        website_url: website,
    };
    if update.is_empty() {
        anyhow::bail!("Nothing to update. Pass --name, --amazon-tag or --website.");
    }

    let session = open_session(config).await?;
    require_user(&session, config)?;

    let user = session.update_profile(&update).await?;
    println!("✓ Profile updated");
    print_user(&user);
    Ok(())
}

fn print_user(user: &User) {
    println!("Name:       {}", user.display_name());
    println!("Email:      {}", user.email);
    if let Some(role) = &user.role {
        println!("Role:       {role}");
    }
    println!(
        "Verified:   {}",
        if user.is_email_verified { "yes" } else { "no" }
    );
    println!("Balance:    {:.2}", user.balance);
    if let Some(tag) = &user.amazon_associate_tag {
        println!("Amazon tag: {tag}");
    }
    if let Some(website) = &user.website_url {
        println!("Website:    {website}");
    }
}
