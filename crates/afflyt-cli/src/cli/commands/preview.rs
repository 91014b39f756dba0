//! Preview command: fetch a public link and walk the visitor to its destination.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use afflyt_core::api::{ClickEvent, USER_AGENT};
use afflyt_core::config::Config;
use afflyt_core::preview::{
    NavigationOutcome, Navigator, PreviewFlow, PreviewPage, PreviewPhase, PreviewRunner,
    PreviewUpdate, Tracker,
};
use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use super::{api_client, browser_enabled, local_store};

/// How long tracking requests may still run once the visitor has left.
const TRACKING_GRACE: Duration = Duration::from_secs(2);

/// Opens URLs in the system browser, or prints them when browsing is off.
struct BrowserNavigator {
    enabled: bool,
}

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &str) -> Result<()> {
        if !self.enabled {
            println!("Open: {url}");
            return Ok(());
        }
        open::that(url).with_context(|| format!("open {url}"))
    }

    fn open_new_context(&self, url: &str) -> Result<()> {
        if !self.enabled {
            println!("Open in new tab: {url}");
            return Ok(());
        }
        open::that_detached(url).with_context(|| format!("open {url} in a new window"))
    }
}

pub async fn run(config: &Config, hash: &str) -> Result<()> {
    let api = api_client(config)?;
    let data = api.public_link(hash).await?;
    let page = PreviewPage::from(&data);

    let tracker = Tracker::new(api, config.preview.pixel_delay());
    let tracking = [
        tracker.register_click(ClickEvent {
            hash: page.hash.clone(),
            referrer: None,
            user_agent: Some(USER_AGENT.to_string()),
        }),
        tracker.fire_pixel(&page.hash),
    ];

    let flow = PreviewFlow::new(hash, page.destination_url.clone(), local_store());
    let navigator = BrowserNavigator {
        enabled: browser_enabled(),
    };
    let mut runner = PreviewRunner::new(flow, navigator, config.preview.clone());

    let outcome = match runner.start() {
        PreviewPhase::AutoRedirecting => {
            println!("Taking you to {}...", runner.flow().domain());
            runner.run_auto_redirect(render_update).await?
        }
        _ => {
            print_page(&page);
            match read_choice()? {
                Choice::Continue => runner.run_primary(render_update).await?,
                Choice::NewTab => runner.run_secondary(render_update)?,
            }
        }
    };

    report(&outcome);
    finish_tracking(tracking).await;
    Ok(())
}

enum Choice {
    Continue,
    NewTab,
}

fn print_page(page: &PreviewPage) {
    println!("{}", page.title);
    if let Some(brand) = &page.brand_name {
        println!("  by {brand}");
    }
    if let Some(message) = &page.brand_message {
        println!("  \"{message}\"");
    }
    println!();
    println!("Destination: {}", page.destination_domain);
    println!("{}", page.disclosure);
    println!();
    println!("  1. {}", page.primary_label);
    println!("  2. {}", page.secondary_label);
}

fn read_choice() -> Result<Choice> {
    print!("Choose [1/2] (default 1): ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    match input.trim() {
        "" | "1" => Ok(Choice::Continue),
        "2" => Ok(Choice::NewTab),
        other => anyhow::bail!("Unknown choice '{other}'. Expected 1 or 2."),
    }
}

fn render_update(update: PreviewUpdate) {
    match update {
        PreviewUpdate::Progress(progress) => {
            print!("\rSecurity check: {progress:>3}%");
            let _ = io::stdout().flush();
            if progress == 100 {
                println!();
            }
        }
        PreviewUpdate::StageReached(stage) => println!("\r  ✓ {}", stage.label()),
        PreviewUpdate::Redirecting { url } => println!("Redirecting to {url}"),
    }
}

fn report(outcome: &NavigationOutcome) {
    match outcome {
        NavigationOutcome::SameTab | NavigationOutcome::NewContext => {}
        NavigationOutcome::FellBackToNewContext => println!("Opened in a new window instead."),
        NavigationOutcome::FellBackToSameTab => println!("Opened in the current window instead."),
        NavigationOutcome::ManualFallback { url } => {
            println!("Could not open the browser. Open this link manually:");
            println!("  {url}");
        }
    }
}

async fn finish_tracking(handles: [JoinHandle<()>; 2]) {
    for handle in handles {
        match tokio::time::timeout(TRACKING_GRACE, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "tracking task failed"),
            Err(_) => tracing::debug!("tracking still pending, dropping it"),
        }
    }
}
