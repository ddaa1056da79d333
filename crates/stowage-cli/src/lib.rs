use anyhow::Context;
use serde::Serialize;
use stowage_storage::{camel_to_id, normalize_link, shard_folder};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Folder part of a default link: `{model}/{shard}/{attribute}`, each part optional
/// except the shard.
pub fn link_folder(id: u64, model: Option<&str>, attribute: Option<&str>) -> String {
    let parts = [
        model.map(camel_to_id).unwrap_or_default(),
        shard_folder(id),
        attribute.unwrap_or_default().to_string(),
    ];
    normalize_link(&parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_folder_shard_only() {
        assert_eq!(link_folder(0, None, None), "0/0/0");
        assert_eq!(link_folder(250_500, None, None), "0/1/1");
    }

    #[test]
    fn link_folder_with_model_and_attribute() {
        assert_eq!(
            link_folder(42, Some("BlogPost"), Some("image")),
            "blog-post/0/0/0/image"
        );
    }
}
