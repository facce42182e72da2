//! What the output device shows: a live status frame or a splash overlay.

use std::fmt;

use serde::Serialize;

use crate::billing::Tariff;
use crate::state::{Snapshot, Status};

/// Full-screen image with an optional caption, shown for one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Splash {
    pub image: String,
    pub text: Option<String>,
}

impl Splash {
    pub fn new(image: impl Into<String>, text: Option<&str>) -> Self {
        Self {
            image: image.into(),
            text: text.map(str::to_string),
        }
    }

    pub fn logo() -> Self {
        Self::new("logo.png", None)
    }

    pub fn processing_payment() -> Self {
        Self::new("wait.png", Some("PROCESSING PAYMENT"))
    }

    pub fn insufficient_credit() -> Self {
        Self::new("denied.png", Some("INSUFFICIENT CREDIT"))
    }
}

/// Live session data, already formatted for a small panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusFrame {
    pub status: Option<Status>,
    pub temperature: Option<f32>,
    pub balance: String,
    pub minutes_left: u64,
    pub fee: String,
    /// QR payload.
    pub address: Option<String>,
    pub fault: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Splash(Splash),
    Status(StatusFrame),
}

impl Frame {
    pub fn status(snapshot: &Snapshot, tariff: &Tariff) -> Self {
        Frame::Status(StatusFrame {
            status: snapshot.status,
            temperature: snapshot.temperature,
            balance: format_balance(snapshot.balance),
            minutes_left: tariff.minutes_covered(snapshot.balance),
            fee: fee_label(tariff),
            address: snapshot.address.clone(),
            fault: snapshot.fault().map(str::to_string),
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Splash(splash) => {
                write!(f, "[{}]", splash.image)?;
                if let Some(text) = &splash.text {
                    write!(f, "\n{}", text)?;
                }
                Ok(())
            }
            Frame::Status(frame) => {
                if let Some(fault) = &frame.fault {
                    writeln!(f, "!! {}", fault)?;
                }
                if let Some(status) = frame.status {
                    writeln!(f, "status: {}", status)?;
                }
                if let Some(temperature) = frame.temperature {
                    writeln!(f, "room temp: {:.1}°C", temperature)?;
                }
                writeln!(f, "{} ({} min)", frame.balance, frame.minutes_left)?;
                write!(f, "{}", frame.fee)?;
                if let Some(address) = &frame.address {
                    write!(f, "\npay to: {}", address)?;
                }
                Ok(())
            }
        }
    }
}

const UNITS: [(u64, &str); 5] = [
    (1_000_000_000_000_000, "Pi"),
    (1_000_000_000_000, "Ti"),
    (1_000_000_000, "Gi"),
    (1_000_000, "Mi"),
    (1_000, "Ki"),
];

/// Render an amount with the largest unit prefix it reaches.
///
/// `999` → `"999 i"`, `1500` → `"1.5 Ki"`, `2_000_000` → `"2 Mi"`.
pub fn format_balance(balance: u64) -> String {
    for (scale, unit) in UNITS {
        if balance >= scale {
            let whole = balance / scale;
            let frac = balance % scale;
            if frac == 0 {
                return format!("{} {}", whole, unit);
            }
            let width = scale.ilog10() as usize;
            let digits = format!("{:0width$}", frac, width = width);
            return format!("{}.{} {}", whole, digits.trim_end_matches('0'), unit);
        }
    }
    format!("{} i", balance)
}

/// `"fee: 1 i / min"` or `"fee: 1 i / 5 min"`.
pub fn fee_label(tariff: &Tariff) -> String {
    let minutes = tariff.tick_minutes();
    let interval = if minutes > 1 {
        format!("{} min", minutes)
    } else {
        "min".to_string()
    };
    format!("fee: {} / {}", format_balance(tariff.tick_cost), interval)
}
