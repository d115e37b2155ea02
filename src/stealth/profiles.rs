//! Device profile pool.
//!
//! A profile bundles the user agent with every fingerprint dimension that
//! has to agree with it (platform string, screen metrics, WebGL identity).
//! Mixing a Windows UA with a Mac platform is an instant tell, so profiles
//! are drawn whole, never field by field.

use once_cell::sync::Lazy;

#[derive(Debug, Clone)]
pub struct StealthProfile {
    pub user_agent: String,
    pub platform: String,
    pub accept_language: String,
    pub languages: Vec<String>,
    pub screen_width: u32,
    pub screen_height: u32,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    pub hardware_concurrency: u32,
}

impl Default for StealthProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            platform: "Win32".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
            screen_width: 1920,
            screen_height: 1080,
            webgl_vendor: "Intel Inc.".to_string(),
            webgl_renderer: "Intel(R) UHD Graphics".to_string(),
            hardware_concurrency: 8,
        }
    }
}

fn profile(
    user_agent: &str,
    platform: &str,
    screen: (u32, u32),
    webgl: (&str, &str),
    cores: u32,
) -> StealthProfile {
    StealthProfile {
        user_agent: user_agent.to_string(),
        platform: platform.to_string(),
        accept_language: "en-US,en;q=0.9".to_string(),
        languages: vec!["en-US".to_string(), "en".to_string()],
        screen_width: screen.0,
        screen_height: screen.1,
        webgl_vendor: webgl.0.to_string(),
        webgl_renderer: webgl.1.to_string(),
        hardware_concurrency: cores,
    }
}

pub static PROFILES: Lazy<Vec<StealthProfile>> = Lazy::new(|| {
    vec![
        profile(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Win32",
            (1920, 1080),
            ("Intel Inc.", "Intel(R) UHD Graphics 630"),
            8,
        ),
        profile(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
            "Win32",
            (2560, 1440),
            ("NVIDIA Corporation", "NVIDIA GeForce GTX 1660/PCIe/SSE2"),
            12,
        ),
        profile(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
            "Win32",
            (1920, 1080),
            ("Intel Inc.", "Intel(R) Iris(R) Xe Graphics"),
            8,
        ),
        profile(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "MacIntel",
            (2560, 1600),
            ("Apple Inc.", "Apple M2"),
            10,
        ),
        profile(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
            "MacIntel",
            (1440, 900),
            ("Intel Inc.", "Intel(R) Iris(TM) Plus Graphics 655"),
            8,
        ),
        profile(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Linux x86_64",
            (1920, 1080),
            ("Mesa", "Mesa Intel(R) UHD Graphics (CML GT2)"),
            8,
        ),
        profile(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
            "Linux x86_64",
            (1920, 1200),
            ("Mesa", "AMD Radeon RX 6600 (radeonsi, navi23, LLVM 15.0.7)"),
            16,
        ),
    ]
});
