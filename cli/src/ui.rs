use anyhow::Result;
use colored::*;
use formatrank_core::{format_duration, format_table, FormatRecord, RankConfig, VideoInfo};

pub fn display_formats(formats: &[FormatRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(formats)?);
        return Ok(());
    }

    if formats.is_empty() {
        println!("{}", "No formats".yellow());
        return Ok(());
    }

    let table = format_table(formats);
    let mut lines = table.lines();
    if let Some(header) = lines.next() {
        println!("{}", header.bold());
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

pub fn display_selection(chosen: &[FormatRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chosen)?);
        return Ok(());
    }

    let ids: Vec<&str> = chosen.iter().map(|f| f.format_id.as_str()).collect();
    println!("{} {}", "Selected:".green().bold(), ids.join("+").cyan());
    for format in chosen {
        println!(
            "  {} {} {}",
            format.format_id.bold(),
            format.effective_ext(),
            format.url.dimmed()
        );
    }
    Ok(())
}

pub fn display_video_info(info: &VideoInfo) {
    println!("{}", info.title.green().bold());
    println!("  ID: {}", info.id);
    if let Some(uploader) = &info.uploader {
        println!("  Uploader: {}", uploader);
    }
    if let Some(duration) = info.duration {
        println!("  Duration: {}", format_duration(duration));
    }
    println!("  Formats: {}", info.formats.len().to_string().yellow());
}

pub fn display_config(config: &RankConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
