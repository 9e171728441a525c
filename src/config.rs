//! Command-line flags with environment fallbacks.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};

use crate::tts::command::CommandLoader;
use crate::tts::sine::SineLoader;
use crate::tts::{DevicePreference, ModelLoader, TtsConfig};

/// Web server for voice-prompted text-to-speech.
#[derive(Parser, Debug)]
#[command(name = "chatterbox-web-server")]
#[command(version)]
pub struct Args {
    /// Host to run the server on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to run the server on
    #[arg(long, env = "PORT", default_value_t = 9080)]
    pub port: u16,

    /// Verbose logging
    #[arg(long, env = "DEBUG", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub debug: bool,

    /// Skip copying bundled voices into the voices directory
    #[arg(long)]
    pub skip_setup: bool,

    /// Directory scanned for voice prompt `.wav` files
    #[arg(long, env = "VOICES_DIR", default_value = "./voices")]
    pub voices_dir: PathBuf,

    /// Voice prompts shipped with the server, copied on setup
    #[arg(long, env = "BUNDLED_VOICES_DIR", default_value = "./assets/voices")]
    pub bundled_voices_dir: PathBuf,

    /// Where generated audio is written
    #[arg(long, env = "OUTPUT_DIR", default_value = "./outputs")]
    pub output_dir: PathBuf,

    /// Directory holding the web UI
    #[arg(long, env = "STATIC_DIR", default_value = "./static")]
    pub static_dir: PathBuf,

    /// Compute device: auto, cuda, mps or cpu
    #[arg(long, env = "TTS_DEVICE", default_value = "auto")]
    pub device: DevicePreference,

    /// External synthesis program; the built-in tone generator is used when unset
    #[arg(long, env = "TTS_COMMAND")]
    pub backend_command: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synthesize a text file once and write output.wav
    Synth {
        /// Text file to read
        #[arg(long)]
        txt_path: PathBuf,

        /// Speaker name matched against the voice catalog
        #[arg(long, default_value = "Alice")]
        speaker: String,

        /// Classifier-free guidance scale
        #[arg(long, default_value_t = 0.5)]
        cfg_scale: f32,
    },
}

impl Args {
    pub fn tts_config(&self) -> TtsConfig {
        TtsConfig {
            voices_dir: self.voices_dir.clone(),
            bundled_voices_dir: self.bundled_voices_dir.clone(),
            output_dir: self.output_dir.clone(),
            device: self.device,
        }
    }

    pub fn loader(&self) -> Box<dyn ModelLoader> {
        match &self.backend_command {
            Some(program) => Box::new(CommandLoader::new(program.clone())),
            None => Box::new(SineLoader),
        }
    }

    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::Device;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["chatterbox-web-server"]).unwrap();
        assert!(!args.skip_setup);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_server_flags() {
        let args = Args::try_parse_from([
            "chatterbox-web-server",
            "--host",
            "127.0.0.1",
            "--port",
            "8000",
            "--debug",
            "--skip-setup",
            "--device",
            "mpx",
        ])
        .unwrap();
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 8000);
        assert!(args.debug);
        assert!(args.skip_setup);
        assert_eq!(args.device, DevicePreference::Fixed(Device::Mps));
        assert_eq!(args.log_filter(), "debug");
    }

    #[test]
    fn test_synth_subcommand() {
        let args = Args::try_parse_from([
            "chatterbox-web-server",
            "synth",
            "--txt-path",
            "script.txt",
            "--speaker",
            "Xinran",
        ])
        .unwrap();
        match args.command {
            Some(Command::Synth {
                txt_path,
                speaker,
                cfg_scale,
            }) => {
                assert_eq!(txt_path, PathBuf::from("script.txt"));
                assert_eq!(speaker, "Xinran");
                assert_eq!(cfg_scale, 0.5);
            }
            None => panic!("expected synth subcommand"),
        }
    }
}
