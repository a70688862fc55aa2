//! Bounce and point sounds
//!
//! The tones are synthesised into in-memory WAV files at startup, so the
//! client ships without asset files.

use log::warn;
use macroquad::audio::{load_sound_from_bytes, play_sound_once, Sound};
use shared::PhysicsEvents;

const SAMPLE_RATE: u32 = 22_050;
const VOLUME: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Bounce,
    Point,
}

/// The sound a tick's events call for. A point outranks a bounce.
pub fn cue(events: &PhysicsEvents) -> Option<Cue> {
    if events.scored.is_some() {
        Some(Cue::Point)
    } else if events.paddle_hit || events.wall_hit {
        Some(Cue::Bounce)
    } else {
        None
    }
}

pub struct Sounds {
    bounce: Option<Sound>,
    point: Option<Sound>,
}

impl Sounds {
    pub fn silent() -> Self {
        Self {
            bounce: None,
            point: None,
        }
    }

    /// A sound that fails to load is left out and the game stays silent for it.
    pub async fn load() -> Self {
        Self {
            bounce: load("bounce", &tone_wav(440.0, 40)).await,
            point: load("point", &tone_wav(880.0, 200)).await,
        }
    }

    pub fn play(&self, events: &PhysicsEvents) {
        let sound = match cue(events) {
            Some(Cue::Bounce) => self.bounce.as_ref(),
            Some(Cue::Point) => self.point.as_ref(),
            None => None,
        };
        if let Some(sound) = sound {
            play_sound_once(sound);
        }
    }
}

async fn load(name: &str, wav: &[u8]) -> Option<Sound> {
    match load_sound_from_bytes(wav).await {
        Ok(sound) => Some(sound),
        Err(e) => {
            warn!("Could not load {} sound: {:?}", name, e);
            None
        }
    }
}

/// 16-bit mono PCM sine tone with a linear fade-out.
pub fn tone_wav(frequency: f32, duration_ms: u32) -> Vec<u8> {
    let samples = SAMPLE_RATE * duration_ms / 1000;
    let data_len = samples * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..samples {
        let t = i as f32 / SAMPLE_RATE as f32;
        let fade = 1.0 - i as f32 / samples as f32;
        let value = (2.0 * std::f32::consts::PI * frequency * t).sin() * VOLUME * fade;
        wav.extend_from_slice(&((value * i16::MAX as f32) as i16).to_le_bytes());
    }

    wav
}
