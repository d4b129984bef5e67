//! Static page text.

/// Title line shown above every page.
pub const BANNER: &str = "CompressionX";

/// Landing page.
pub const HOME: &str = "\
Welcome to CompressionX

Explore AI-powered compression and upscaling.
Run `compressionx demo <IMAGE>` to see the pipeline in action!";

/// Project description.
pub const ABOUT: &str = "\
About CompressionX

CompressionX explores AI-enhanced data compression.
Files are compressed at lower resolutions to reduce server stress,
and AI upscaling then runs locally for real-time restoration.";

/// Where to get in touch.
pub const CONTACT: &str = "\
Contact

For inquiries or collaboration, open an issue in the project
repository.";

/// Render a page under the banner, with the package version.
#[must_use]
pub fn render(page: &str) -> String {
    format!(
        "{BANNER} v{}\n{}\n\n{page}",
        env!("CARGO_PKG_VERSION"),
        "=".repeat(40)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_puts_banner_first() {
        let page = render(HOME);
        assert!(page.starts_with("CompressionX v"));
        assert!(page.ends_with("in action!"));
    }

    #[test]
    fn home_points_at_demo() {
        assert!(HOME.contains("compressionx demo"));
    }
}
