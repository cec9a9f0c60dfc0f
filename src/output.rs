//! One-shot metrics output: stdout dump and textfile-collector files.

use std::io::Write;
use std::path::Path;

use common::{Error, Result};
use prometheus::{Encoder, Registry, TextEncoder};

/// Gather `registry` and render it in the Prometheus text format.
pub fn encode_registry(registry: &Registry) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| Error::Metrics(e.to_string()))?;
    Ok(buffer)
}

/// Dump the registry to stdout once, for cron-style scraping via a pipe.
pub fn write_stdout(registry: &Registry) -> Result<()> {
    let body = encode_registry(registry)?;
    std::io::stdout().write_all(&body)?;
    Ok(())
}

/// Write the registry to `path` for the node_exporter textfile collector.
///
/// The file is written to a temp sibling and renamed into place, so a
/// concurrently scraping collector never sees a half-written file.
pub fn write_textfile(path: &Path, registry: &Registry) -> Result<()> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("prom") {
        return Err(Error::Config(format!(
            "filename must end with .prom extension: {}",
            path.display()
        )));
    }

    let body = encode_registry(registry)?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, &body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntGauge, Opts};

    fn registry_with_gauge() -> Registry {
        let registry = Registry::new();
        let gauge = IntGauge::with_opts(Opts::new("test_metric", "Test metric.")).unwrap();
        gauge.set(42);
        registry.register(Box::new(gauge)).unwrap();
        registry
    }

    #[test]
    fn test_encode_renders_text_format() {
        let body = encode_registry(&registry_with_gauge()).unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(text.contains("# HELP test_metric Test metric."));
        assert!(text.contains("test_metric 42"));
    }

    #[test]
    fn test_textfile_requires_prom_extension() {
        let registry = registry_with_gauge();
        let err = write_textfile(Path::new("/tmp/metrics.txt"), &registry).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_textfile_written_atomically() {
        let dir = std::env::temp_dir().join("vattenfall-exporter-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("prices.prom");

        write_textfile(&path, &registry_with_gauge()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("test_metric 42"));
        assert!(!path.with_extension("prom.tmp").exists());

        std::fs::remove_file(&path).unwrap();
    }
}
