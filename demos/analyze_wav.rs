//! Example: Analyze a WAV file
//!
//! Usage:
//!   cargo run --release --example analyze_wav -- [--json] <file.wav>

use std::env;

use stratum_mir::{analyze_audio, AnalysisConfig, CancellationToken, Outcome, PcmBuffer};

fn load_wav(path: &str) -> Result<PcmBuffer, Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(PcmBuffer::from_interleaved(spec.sample_rate, spec.channels as usize, &samples)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .ok_or("usage: analyze_wav [--json] <file.wav>")?;

    let buffer = load_wav(path)?;
    let result = match analyze_audio(&buffer, &AnalysisConfig::default(), &CancellationToken::new())? {
        Outcome::Completed(result) => result,
        Outcome::Cancelled => return Err("analysis cancelled".into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Analysis Results:");
    println!(
        "  Candidates: {} onset, {} beat, {} flux",
        result.candidates.onset.len(),
        result.candidates.beat.len(),
        result.candidates.flux.len()
    );
    for family in result.families() {
        println!("  Family {} (hue {:.0}):", family.family_id, family.hue);
        for h in &family.members {
            println!(
                "    {:>4} {:7.2} BPM  confidence {:.3}  ({} intervals)",
                h.id.rsplit('@').next().unwrap_or(""),
                h.bpm,
                h.confidence,
                h.evidence.supporting_interval_count
            );
        }
    }
    if let Some(phase) = result.phase.active() {
        println!("  Phase offset: {:.3} s (score {:.2})", phase.phase_offset, phase.score);
    }
    let beats = result.beat_times();
    println!("  Beats: {} (first: {:?})", beats.len(), beats.iter().take(4).collect::<Vec<_>>());
    if !result.metadata.flags.is_empty() {
        println!("  Flags: {:?}", result.metadata.flags);
    }
    println!("  Processing time: {:.2} ms", result.metadata.processing_time_ms);

    Ok(())
}
