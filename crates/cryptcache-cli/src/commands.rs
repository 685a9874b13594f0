//! Subcommand implementations.
//!
//! Commands write their report to the supplied writer so they can be tested
//! without capturing stdout.

use crate::config::{Cli, Command};
use anyhow::{Context, Result, bail};
use cryptcache_codec::{compress, uncompress};
use cryptcache_storage::{CacheConfig, CacheDirectory};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Process exit status reported by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Command succeeded.
    Success,
    /// Command ran but the queried entry is absent.
    Missing,
}

impl Outcome {
    /// Numeric process exit code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Missing => 1,
        }
    }
}

/// Run the parsed command line.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<Outcome> {
    let config = cli.cache_config()?;

    match &cli.command {
        Command::List { prefix, json } => list(&config, prefix, *json, out),
        Command::Get {
            name,
            output,
            uncompress,
            multiplier,
        } => get(
            &config,
            name,
            output.as_deref(),
            uncompress.then(|| multiplier.unwrap_or(config.uncompress_multiplier)),
            out,
        ),
        Command::Put {
            name,
            file,
            compress,
        } => put(&config, name, file, *compress, out),
        Command::Erase { name } => erase(&config, name, out),
        Command::Exists { name } => exists(&config, name, out),
        Command::Stats { json } => stats(&config, *json, out),
        Command::Slots => slots(&config, out),
        Command::Compress { input, output } => compress_file(input, output, out),
        Command::Uncompress {
            input,
            output,
            multiplier,
        } => uncompress_file(
            input,
            output,
            multiplier.unwrap_or(config.uncompress_multiplier),
            out,
        ),
    }
}

/// Open or create the cache for writing.
fn open(config: &CacheConfig) -> Result<CacheDirectory> {
    CacheDirectory::from_config(config)
        .with_context(|| format!("opening cache {}", config.path.display()))
}

/// Open a cache that must already exist; anything else is left untouched.
fn open_existing(config: &CacheConfig) -> Result<CacheDirectory> {
    CacheDirectory::open_existing(&config.path)
        .with_context(|| format!("opening cache {}", config.path.display()))
}

fn list<W: Write>(config: &CacheConfig, prefix: &str, json: bool, out: &mut W) -> Result<Outcome> {
    let mut names = open_existing(config)?.list(prefix);
    names.sort();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&names)?)?;
    } else {
        for name in &names {
            writeln!(out, "{name}")?;
        }
    }
    Ok(Outcome::Success)
}

fn get<W: Write>(
    config: &CacheConfig,
    name: &str,
    output: Option<&Path>,
    multiplier: Option<u32>,
    out: &mut W,
) -> Result<Outcome> {
    let Some(mut data) = open_existing(config)?.get(name)? else {
        bail!("no entry named '{name}'");
    };

    if let Some(multiplier) = multiplier {
        data = uncompress(&data, multiplier)
            .with_context(|| format!("entry '{name}' is not a compressed stream"))?;
    }

    match output {
        Some(path) => {
            fs::write(path, &data).with_context(|| format!("writing {}", path.display()))?;
            info!(entry = name, len = data.len(), path = %path.display(), "entry saved");
        }
        None => out.write_all(&data)?,
    }
    Ok(Outcome::Success)
}

fn put<W: Write>(
    config: &CacheConfig,
    name: &str,
    file: &Path,
    compressed: bool,
    out: &mut W,
) -> Result<Outcome> {
    let mut data = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    if compressed {
        let raw = data.len();
        data = compress(&data)?;
        debug!(raw, framed = data.len(), "input compressed");
    }

    let mut cache = open(config)?;
    cache.put(name, &data)?;
    cache.close()?;
    writeln!(out, "stored '{name}' ({} bytes)", data.len())?;
    Ok(Outcome::Success)
}

fn erase<W: Write>(config: &CacheConfig, name: &str, out: &mut W) -> Result<Outcome> {
    let mut cache = open_existing(config)?;
    if !cache.exists(name) {
        writeln!(out, "no entry named '{name}'")?;
        return Ok(Outcome::Missing);
    }
    cache.erase(name)?;
    cache.close()?;
    writeln!(out, "erased '{name}'")?;
    Ok(Outcome::Success)
}

fn exists<W: Write>(config: &CacheConfig, name: &str, out: &mut W) -> Result<Outcome> {
    let found = open_existing(config)?.exists(name);
    writeln!(out, "{found}")?;
    Ok(if found {
        Outcome::Success
    } else {
        Outcome::Missing
    })
}

fn stats<W: Write>(config: &CacheConfig, json: bool, out: &mut W) -> Result<Outcome> {
    let stats = open_existing(config)?.stats()?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
    } else {
        writeln!(out, "file size:      {}", stats.file_size)?;
        writeln!(out, "live slots:     {}", stats.live_slots)?;
        writeln!(out, "reserved slots: {}", stats.reserved_slots)?;
        writeln!(out, "empty slots:    {}", stats.empty_slots)?;
        writeln!(out, "live bytes:     {}", stats.live_bytes)?;
        writeln!(out, "reserved bytes: {}", stats.reserved_bytes)?;
    }
    Ok(Outcome::Success)
}

fn slots<W: Write>(config: &CacheConfig, out: &mut W) -> Result<Outcome> {
    let cache = open_existing(config)?;

    writeln!(
        out,
        "{:>5}  {:<8}  {:>10}  {:>8}  {:>8}  {:<8}  {:<40}  name",
        "slot", "state", "offset", "len", "capacity", "crc", "key"
    )?;
    for slot in cache.slots() {
        writeln!(
            out,
            "{:>5}  {:<8}  {:>10}  {:>8}  {:>8}  {:08x}  {:<40}  {}",
            slot.index,
            slot.state.to_string(),
            slot.offset,
            slot.len,
            slot.capacity,
            slot.crc,
            hex::encode(slot.key),
            slot.name
        )?;
    }
    Ok(Outcome::Success)
}

fn compress_file<W: Write>(input: &Path, output: &Path, out: &mut W) -> Result<Outcome> {
    let data = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let framed = compress(&data)?;
    fs::write(output, &framed).with_context(|| format!("writing {}", output.display()))?;
    writeln!(out, "{} -> {} bytes", data.len(), framed.len())?;
    Ok(Outcome::Success)
}

fn uncompress_file<W: Write>(
    input: &Path,
    output: &Path,
    multiplier: u32,
    out: &mut W,
) -> Result<Outcome> {
    let framed = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let data = uncompress(&framed, multiplier)
        .with_context(|| format!("decoding {}", input.display()))?;
    fs::write(output, &data).with_context(|| format!("writing {}", output.display()))?;
    writeln!(out, "{} -> {} bytes", framed.len(), data.len())?;
    Ok(Outcome::Success)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().expect("temp dir"),
            }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }

        fn run(&self, args: &[&str]) -> (Result<Outcome>, String) {
            let cache = self.path("Cache.bin");
            let mut argv = vec!["cryptcache", "--cache", cache.as_str()];
            argv.extend_from_slice(args);
            let cli = Cli::try_parse_from(argv).expect("parse");

            let mut out = Vec::new();
            let outcome = run(&cli, &mut out);
            (outcome, String::from_utf8_lossy(&out).into_owned())
        }

        fn run_ok(&self, args: &[&str]) -> String {
            let (outcome, out) = self.run(args);
            assert_eq!(outcome.expect("command failed"), Outcome::Success);
            out
        }
    }

    #[test]
    fn test_put_get_list() {
        let fx = Fixture::new();
        let input = fx.path("table.txt");
        fs::write(&input, "{100}{}{Hello}\n").expect("write");

        fx.run_ok(&["put", "lang/en/FOGAME", &input]);
        fx.run_ok(&["put", "lang/de/FOGAME", &input]);

        assert_eq!(fx.run_ok(&["get", "lang/en/FOGAME"]), "{100}{}{Hello}\n");
        assert_eq!(
            fx.run_ok(&["list"]),
            "lang/de/FOGAME\nlang/en/FOGAME\n"
        );
        assert_eq!(fx.run_ok(&["list", "lang/en"]), "lang/en/FOGAME\n");

        let json: Vec<String> =
            serde_json::from_str(&fx.run_ok(&["list", "--json"])).expect("json list");
        assert_eq!(json.len(), 2);
    }

    #[test]
    fn test_compressed_put_and_get() {
        let fx = Fixture::new();
        let input = fx.path("table.txt");
        let text = "{200}{}{Compressed entry}\n".repeat(50);
        fs::write(&input, &text).expect("write");

        fx.run_ok(&["put", "lang/en/FODLG", &input, "--compress"]);
        assert_eq!(
            fx.run_ok(&["get", "lang/en/FODLG", "--uncompress"]),
            text
        );

        let saved = fx.path("saved.bin");
        fx.run_ok(&["get", "lang/en/FODLG", "--uncompress", "-o", &saved]);
        assert_eq!(fs::read_to_string(&saved).expect("read"), text);
    }

    #[test]
    fn test_exists_and_erase() {
        let fx = Fixture::new();
        let input = fx.path("data.bin");
        fs::write(&input, [1u8, 2, 3]).expect("write");

        fx.run_ok(&["put", "entry", &input]);
        assert_eq!(fx.run_ok(&["exists", "entry"]), "true\n");

        let (outcome, out) = fx.run(&["exists", "other"]);
        assert_eq!(outcome.expect("exists"), Outcome::Missing);
        assert_eq!(out, "false\n");

        fx.run_ok(&["erase", "entry"]);
        let (outcome, _) = fx.run(&["erase", "entry"]);
        assert_eq!(outcome.expect("erase").code(), 1);
    }

    #[test]
    fn test_inspection_never_touches_foreign_files() {
        let fx = Fixture::new();
        let notes = fx.path("notes.txt");
        fs::write(&notes, "my important notes\n").expect("write");

        for args in [
            vec!["list"],
            vec!["get", "entry"],
            vec!["exists", "entry"],
            vec!["stats"],
            vec!["slots"],
            vec!["erase", "entry"],
        ] {
            let mut argv = vec!["cryptcache", "--cache", notes.as_str()];
            argv.extend(args.iter().copied());
            let cli = Cli::try_parse_from(argv).expect("parse");
            let mut out = Vec::new();
            assert!(run(&cli, &mut out).is_err(), "{args:?} should fail");
        }

        assert_eq!(
            fs::read_to_string(&notes).expect("read"),
            "my important notes\n"
        );
    }

    #[test]
    fn test_inspection_does_not_create_cache() {
        let fx = Fixture::new();
        let (outcome, _) = fx.run(&["list"]);
        assert!(outcome.is_err());
        assert!(!fx.dir.path().join("Cache.bin").exists());
    }

    #[test]
    fn test_get_missing_fails() {
        let fx = Fixture::new();
        let input = fx.path("data.bin");
        fs::write(&input, b"x").expect("write");
        fx.run_ok(&["put", "present", &input]);

        let (outcome, _) = fx.run(&["get", "missing"]);
        assert!(outcome.is_err());
    }

    #[test]
    fn test_stats_and_slots() {
        let fx = Fixture::new();
        let input = fx.path("data.bin");
        fs::write(&input, vec![0u8; 100]).expect("write");
        fx.run_ok(&["put", "first", &input]);
        fx.run_ok(&["put", "second", &input]);
        fx.run_ok(&["erase", "first"]);

        let stats: serde_json::Value =
            serde_json::from_str(&fx.run_ok(&["stats", "--json"])).expect("json stats");
        assert_eq!(stats["live_slots"], 1);
        assert_eq!(stats["reserved_slots"], 1);
        assert_eq!(stats["live_bytes"], 100);

        let text = fx.run_ok(&["stats"]);
        assert!(text.contains("live slots:     1"));

        let table = fx.run_ok(&["slots"]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("reserved"));
        assert!(lines[2].contains("live"));
        assert!(lines[2].ends_with("second"));
    }

    #[test]
    fn test_compress_uncompress_files() {
        let fx = Fixture::new();
        let raw = fx.path("raw.txt");
        let framed = fx.path("raw.z");
        let back = fx.path("back.txt");
        fs::write(&raw, "abcabcabc".repeat(100)).expect("write");

        fx.run_ok(&["compress", &raw, &framed]);
        let framed_bytes = fs::read(&framed).expect("read");
        assert_ne!(&framed_bytes[..2], &[0x78, 0x9C]);

        fx.run_ok(&["uncompress", &framed, &back, "--multiplier", "1"]);
        assert_eq!(
            fs::read(&back).expect("read"),
            fs::read(&raw).expect("read")
        );
    }

    #[test]
    fn test_uncompress_rejects_garbage() {
        let fx = Fixture::new();
        let input = fx.path("garbage.bin");
        fs::write(&input, [0u8; 32]).expect("write");
        let (outcome, _) = fx.run(&["uncompress", &input, &fx.path("out.bin")]);
        assert!(outcome.is_err());
    }
}
