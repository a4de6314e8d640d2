//! Command handlers

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use redstone_protocol::{
    DataPackage, DataPoint, DataPointKind, RedstonePayload, Rounding, SignedDataPackage,
    UniversalSigner, parser,
};

/// Options for `redstone sign`
pub struct SignOptions<'a> {
    pub private_key: &'a str,
    pub points: &'a [String],
    pub timestamp: Option<u64>,
    pub strings: bool,
    pub decimals: u8,
    pub byte_size: usize,
}

/// Split `FEED=VALUE` into its parts
pub fn parse_point_arg(arg: &str) -> Result<(&str, &str)> {
    let (feed, value) = arg
        .split_once('=')
        .with_context(|| format!("Invalid data point '{arg}': expected FEED=VALUE"))?;
    let feed = feed.trim();
    if feed.is_empty() {
        anyhow::bail!("Invalid data point '{arg}': feed id is empty");
    }
    Ok((feed, value.trim()))
}

/// Build data points from `FEED=VALUE` arguments
pub fn build_data_points(
    args: &[String],
    strings: bool,
    decimals: u8,
    byte_size: usize,
) -> Result<Vec<DataPoint>> {
    args.iter()
        .map(|arg| {
            let (feed, value) = parse_point_arg(arg)?;
            if strings {
                return Ok(DataPoint::string(feed, value));
            }
            DataPoint::numeric_with_precision(feed, value, decimals, byte_size, Rounding::Nearest)
                .with_context(|| format!("Invalid numeric value for {feed}: {value}"))
        })
        .collect()
}

/// Current time in milliseconds
fn now_milliseconds() -> Result<u64> {
    u64::try_from(Utc::now().timestamp_millis()).context("System clock is before the Unix epoch")
}

fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| timestamp.to_string(), |dt| dt.to_rfc3339())
}

/// Human-readable value of a data point
pub fn format_value(point: &DataPoint, decimals: u8) -> String {
    match point.kind() {
        DataPointKind::Fixed => point.numeric_value(decimals),
        DataPointKind::Dynamic => point.string_value().map_or_else(
            || format!("0x{}", hex::encode(point.value())),
            |s| format!("{s:?}"),
        ),
    }
}

/// `redstone address`
pub fn address(private_key: &str) -> Result<()> {
    let signer = UniversalSigner::from_hex(private_key).context("Invalid private key")?;
    println!("{}", signer.address());
    Ok(())
}

/// `redstone sign`
pub fn sign(opts: &SignOptions<'_>) -> Result<()> {
    let signer = UniversalSigner::from_hex(opts.private_key).context("Invalid private key")?;
    let points = build_data_points(opts.points, opts.strings, opts.decimals, opts.byte_size)?;
    let timestamp = match opts.timestamp {
        Some(timestamp) => timestamp,
        None => now_milliseconds()?,
    };

    let signed = DataPackage::new(points, timestamp)
        .context("Failed to build data package")?
        .sign(&signer)
        .context("Failed to sign data package")?;

    log::info!(
        "Signed {} data points @{} as {}",
        signed.data_package().data_points().len(),
        format_timestamp(timestamp),
        signer.address()
    );
    println!("{}", hex::encode(signed.serialize()));
    Ok(())
}

/// `redstone prepare`
pub fn prepare(packages: &[String], metadata: &[u8]) -> Result<()> {
    let signed = packages
        .iter()
        .enumerate()
        .map(|(i, package)| {
            SignedDataPackage::from_hex(package)
                .with_context(|| format!("Invalid signed data package #{}", i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let payload =
        RedstonePayload::prepare_hex(&signed, metadata).context("Failed to prepare payload")?;
    println!("{payload}");
    Ok(())
}

/// `redstone parse`
pub fn parse(payload: &str, verify: bool, decimals: u8) -> Result<()> {
    let parsed = parser::parse_hex(payload).context("Failed to parse payload")?;

    println!();
    println!(
        "{} {} data packages",
        "RedStone payload:".bold(),
        parsed.signed_data_packages.len()
    );
    if !parsed.remainder.is_empty() {
        println!(
            "  Prefix: {} bytes {}",
            parsed.remainder.len(),
            "(not part of the payload)".dimmed()
        );
    }
    println!(
        "  Metadata: {}",
        String::from_utf8(parsed.unsigned_metadata.clone())
            .unwrap_or_else(|_| format!("0x{}", hex::encode(&parsed.unsigned_metadata)))
    );

    let mut failures = 0usize;
    for (i, signed) in parsed.signed_data_packages.iter().enumerate() {
        let package = signed.data_package();
        println!();
        println!(
            "{} #{} @ {}",
            "Package".bold(),
            i + 1,
            format_timestamp(package.timestamp_milliseconds())
        );

        if verify {
            match signed.verify_and_recover() {
                Ok(address) => println!("  {} signer {address}", "✓".green()),
                Err(e) => {
                    failures += 1;
                    println!("  {} {e}", "✗".red());
                }
            }
        }

        for point in package.data_points() {
            let feed = point.data_feed_id().to_string();
            println!("  {feed:<32} {}", format_value(point, decimals));
        }
    }
    println!();

    if failures > 0 {
        anyhow::bail!("{failures} data package(s) failed signature verification");
    }
    Ok(())
}

/// `redstone sign-data`
pub fn sign_data(private_key: &str, json: &str) -> Result<()> {
    let signer = UniversalSigner::from_hex(private_key).context("Invalid private key")?;
    let value: serde_json::Value = serde_json::from_str(json).context("Data is not valid JSON")?;
    let signature = signer
        .sign_stringifiable_data(&value)
        .context("Failed to sign data")?;

    log::debug!("Signed structured data as {}", signer.address());
    println!("{}", signature.to_hex());
    Ok(())
}
