//! fdn-render - Offline impulse-response renderer
//!
//! Run with: cargo run --bin fdn-render -- --order 16 --low-t60 2.0 --output ir.wav

mod analysis;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, WrapErr};

use analysis::{Band, DecayAnalyzer};
use fdn_verb::dsp::matrix::{hadamard, householder};
use fdn_verb::{FdnConfig, FdnReverb, FilterParams, NetworkOrder, MAX_BLOCK_SIZE};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MatrixKind {
    Identity,
    Householder,
    Hadamard,
}

/// Render an impulse through the reverb and report per-band decay times.
#[derive(Debug, Parser)]
#[command(name = "fdn-render", version)]
struct Args {
    /// Number of delay lines (4, 8, 16 or 32)
    #[arg(long, default_value_t = 16)]
    order: usize,

    #[arg(long, default_value_t = 48_000.0)]
    sample_rate: f32,

    #[arg(long, default_value_t = 2)]
    channels: usize,

    /// Length of the rendered response
    #[arg(long, default_value_t = 3.0)]
    seconds: f32,

    /// Upper delay bound in ms; the lower bound follows at 60 %
    #[arg(long)]
    delay_ms: Option<f32>,

    #[arg(long, default_value_t = 1.0)]
    low_t60: f32,

    #[arg(long, default_value_t = 0.5)]
    high_t60: f32,

    #[arg(long, default_value_t = 400.0)]
    low_hz: f32,

    #[arg(long, default_value_t = 2500.0)]
    high_hz: f32,

    #[arg(long, value_enum, default_value_t = MatrixKind::Householder)]
    matrix: MatrixKind,

    /// Modulation depth in samples
    #[arg(long, default_value_t = 0.0)]
    mod_depth: f32,

    /// Shared modulation rate in Hz
    #[arg(long)]
    mod_rate: Option<f32>,

    #[arg(long)]
    seed: Option<u64>,

    /// Write the response as a 32-bit float WAV
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let args = Args::parse();
    let order = NetworkOrder::new(args.order)?;
    let filter = FilterParams {
        low_t60: args.low_t60,
        high_t60: args.high_t60,
        low_transition_hz: args.low_hz,
        high_transition_hz: args.high_hz,
    };

    let mut config = FdnConfig::default()
        .with_sample_rate(args.sample_rate)
        .with_channels(args.channels)
        .with_order(order)
        .with_filter(filter)
        .with_dry_wet(1.0)
        .with_modulation(args.mod_depth, args.mod_rate);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let mut fdn = FdnReverb::new(config).wrap_err("building reverb")?;
    if let Some(ms) = args.delay_ms {
        fdn.update_delay(ms).wrap_err("setting delay window")?;
    }
    load_matrix(&mut fdn, args.matrix)?;

    let response = render_impulse(&mut fdn, args.channels, args.seconds);
    log::info!(
        "rendered {} frames, delays {:?}",
        response[0].len(),
        fdn.delay_lengths()
    );

    let bands = [
        Band {
            name: "low",
            low_hz: 20.0,
            high_hz: args.low_hz,
        },
        Band {
            name: "mid",
            low_hz: args.low_hz,
            high_hz: args.high_hz,
        },
        Band {
            name: "high",
            low_hz: args.high_hz,
            high_hz: (args.sample_rate * 0.5).min(20_000.0),
        },
    ];
    let mut analyzer = DecayAnalyzer::new(args.sample_rate);
    for decay in analyzer.analyze(&response[0], &bands) {
        match decay.t60 {
            Some(t60) => println!(
                "{:>5} {:>7.0}-{:<7.0} Hz  T60 {:.3} s",
                decay.band.name, decay.band.low_hz, decay.band.high_hz, t60
            ),
            None => println!(
                "{:>5} {:>7.0}-{:<7.0} Hz  T60 longer than render",
                decay.band.name, decay.band.low_hz, decay.band.high_hz
            ),
        }
    }

    if let Some(path) = args.output {
        write_wav(&path, &response, args.sample_rate)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn load_matrix(fdn: &mut FdnReverb, kind: MatrixKind) -> color_eyre::Result<()> {
    let n = fdn.order().get();
    let coefficients = match kind {
        MatrixKind::Identity => return Ok(()),
        MatrixKind::Householder => householder(n),
        MatrixKind::Hadamard => {
            hadamard(n).ok_or_else(|| eyre!("hadamard needs a power-of-two order"))?
        }
    };
    fdn.set_matrix(&coefficients)?;
    Ok(())
}

/// Unit impulse on every channel, processed block by block.
fn render_impulse(fdn: &mut FdnReverb, channels: usize, seconds: f32) -> Vec<Vec<f32>> {
    let frames = (seconds * fdn.sample_rate()).max(1.0) as usize;
    let mut response = vec![vec![0.0f32; frames]; channels];
    for channel in &mut response {
        channel[0] = 1.0;
    }

    let mut start = 0;
    while start < frames {
        let end = (start + MAX_BLOCK_SIZE).min(frames);
        let mut block: Vec<&mut [f32]> = response
            .iter_mut()
            .map(|channel| &mut channel[start..end])
            .collect();
        fdn.process_block(&mut block);
        start = end;
    }
    response
}

fn write_wav(path: &PathBuf, response: &[Vec<f32>], sample_rate: f32) -> color_eyre::Result<()> {
    let spec = hound::WavSpec {
        channels: response.len() as u16,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .wrap_err_with(|| format!("creating {}", path.display()))?;
    let frames = response.first().map_or(0, Vec::len);
    for n in 0..frames {
        for channel in response {
            writer.write_sample(channel[n])?;
        }
    }
    writer.finalize()?;
    Ok(())
}
