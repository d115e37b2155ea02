//! Anti-detection: device profiles and evasion-script injection.
//!
//! Each session draws a random [`StealthProfile`] (user agent plus the
//! fingerprint surface that must stay consistent with it) and gets a fixed
//! sequence of init scripts registered before any document runs. Injection
//! is best-effort per script; only a total failure aborts session creation.

use anyhow::{Result, anyhow};
use rand::prelude::IndexedRandom;
use tracing::{debug, warn};

use crate::browser::PageDriver;

mod profiles;
mod scripts;

pub use profiles::StealthProfile;

/// Draw a random device profile for a new session.
pub fn random_profile() -> StealthProfile {
    let mut rng = rand::rng();
    profiles::PROFILES
        .choose(&mut rng)
        .cloned()
        .unwrap_or_default()
}

/// Register the evasion scripts on a fresh page, in dependency order, then
/// pin the user-agent override to the profile.
pub async fn inject(page: &dyn PageDriver, profile: &StealthProfile) -> Result<()> {
    // Fingerprint config must land before any evasion script reads it.
    let session_seed: Vec<u8> = (0..16).map(|_| rand::random::<u8>()).collect();
    let config_script = format!(
        r#"window.__ppConfig = {{
            platform: {platform},
            language: "en-US",
            languages: {languages},
            screenWidth: {width},
            screenHeight: {height},
            webglVendor: {vendor},
            webglRenderer: {renderer},
            hardwareConcurrency: {cores},
            sessionSeed: "{seed}"
        }};"#,
        platform = js_str(&profile.platform),
        languages = serde_json::to_string(&profile.languages).unwrap_or_else(|_| "[]".into()),
        width = profile.screen_width,
        height = profile.screen_height,
        vendor = js_str(&profile.webgl_vendor),
        renderer = js_str(&profile.webgl_renderer),
        cores = profile.hardware_concurrency,
        seed = hex::encode(&session_seed),
    );
    page.add_init_script(&config_script).await?;

    let mut injected = 0usize;
    for (name, source) in scripts::EVASION_SCRIPTS {
        match page.add_init_script(source).await {
            Ok(()) => {
                debug!("Injected evasion script: {name}");
                injected += 1;
            }
            Err(e) => warn!("Failed to inject evasion script {name}: {e}"),
        }
    }

    if injected == 0 {
        return Err(anyhow!("failed to inject any stealth scripts"));
    }

    // Headless builds advertise themselves in the UA string.
    let cleaned_ua = profile.user_agent.replace("Headless", "");
    page.set_user_agent(
        &cleaned_ua,
        Some(&profile.accept_language),
        Some(&profile.platform),
    )
    .await?;

    debug!(
        "Stealth injection complete: {injected}/{} scripts active",
        scripts::EVASION_SCRIPTS.len()
    );
    Ok(())
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
