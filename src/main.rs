use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use env_logger::Target;
use play_from_disk_opus::{Config, EndOfStream, DEFAULT_AUDIO_FILE, DEFAULT_STUN_SERVER};

#[derive(Parser)]
#[command(name = "play-from-disk-opus")]
#[command(author = "Rain Liu <yliu@webrtc.rs>")]
#[command(version = "0.1.0")]
#[command(about = "Stream raw 48kHz stereo f32 PCM from disk to a browser as Opus.")]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(short, long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(short, long, default_value_t = format!(""))]
    output_log_file: String,
    /// Read the base64 offer from this file instead of stdin
    #[arg(short, long)]
    input_sdp_file: Option<PathBuf>,
    /// Raw PCM file to stream (interleaved little-endian f32, 48kHz stereo)
    #[arg(short, long, default_value = DEFAULT_AUDIO_FILE)]
    audio: PathBuf,
    /// What to do at the end of the audio file: stop or loop
    #[arg(short, long, default_value_t = EndOfStream::Stop)]
    end_of_stream: EndOfStream,
    /// Opus target bitrate in bits per second
    #[arg(short, long)]
    bitrate: Option<i32>,
    /// ICE server url, may be repeated
    #[arg(long = "ice-server", default_values_t = [DEFAULT_STUN_SERVER.to_owned()])]
    ice_servers: Vec<String>,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            audio_file: cli.audio,
            end_of_stream: cli.end_of_stream,
            bitrate: cli.bitrate,
            ice_servers: cli.ice_servers,
            input_sdp_file: cli.input_sdp_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        let log_level = log::LevelFilter::from_str(&cli.log_level)?;
        env_logger::Builder::new()
            .target(if !cli.output_log_file.is_empty() {
                Target::Pipe(Box::new(
                    OpenOptions::new()
                        .create(true)
                        .write(true)
                        .truncate(true)
                        .open(&cli.output_log_file)?,
                ))
            } else {
                Target::Stdout
            })
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }

    let stats = play_from_disk_opus::run(Config::from(cli)).await?;
    println!("Audio stream finished: {stats}");

    Ok(())
}
