use anyhow::{anyhow, bail, Context};
use hx711::ConversionMode;

/// Runtime settings, read from `HX711_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `HX711_MODE`: `a128`, `b32` or `a64`.
    pub mode: ConversionMode,
    /// `HX711_SINGLE`: one conversion, then power down.
    pub single: bool,
    /// `HX711_SAMPLES`: stop after this many conversions, 0 runs until interrupted.
    pub samples: usize,
    /// `HX711_SLIP_EVERY`: simulator only, drop a clock edge every nth conversion. 0 disables.
    pub slip_every: usize,
    /// `HX711_SCK_PIN`: BCM number of PD_SCK.
    pub sck_pin: u8,
    /// `HX711_DOUT_PIN`: BCM number of DOUT.
    pub dout_pin: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ConversionMode::default(),
            single: false,
            samples: 20,
            slip_every: 0,
            sck_pin: 5,
            dout_pin: 6,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let mut config = Self::default();

        if let Some(mode) = lookup("HX711_MODE") {
            config.mode = mode.parse().map_err(|e| anyhow!("HX711_MODE={mode:?}: {e}"))?;
        }

        if let Some(single) = lookup("HX711_SINGLE") {
            config.single = parse_flag(&single).context("HX711_SINGLE")?;
        }

        if let Some(samples) = lookup("HX711_SAMPLES") {
            config.samples = samples
                .trim()
                .parse()
                .with_context(|| format!("HX711_SAMPLES={samples:?}"))?;
        }

        if let Some(slip_every) = lookup("HX711_SLIP_EVERY") {
            config.slip_every = slip_every
                .trim()
                .parse()
                .with_context(|| format!("HX711_SLIP_EVERY={slip_every:?}"))?;
        }

        if let Some(pin) = lookup("HX711_SCK_PIN") {
            config.sck_pin = pin.trim().parse().with_context(|| format!("HX711_SCK_PIN={pin:?}"))?;
        }

        if let Some(pin) = lookup("HX711_DOUT_PIN") {
            config.dout_pin = pin.trim().parse().with_context(|| format!("HX711_DOUT_PIN={pin:?}"))?;
        }

        if config.sck_pin == config.dout_pin {
            bail!("PD_SCK and DOUT cannot share pin {}", config.sck_pin);
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Result<bool, anyhow::Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        assert_eq!(parse(&[]).unwrap(), Config::default());
    }

    #[test]
    fn overrides() {
        let config = parse(&[
            ("HX711_MODE", "B32"),
            ("HX711_SINGLE", "yes"),
            ("HX711_SAMPLES", "5"),
            ("HX711_SLIP_EVERY", "3"),
            ("HX711_SCK_PIN", "17"),
            ("HX711_DOUT_PIN", "27"),
        ])
        .unwrap();

        assert_eq!(
            config,
            Config {
                mode: ConversionMode::ChannelB32,
                single: true,
                samples: 5,
                slip_every: 3,
                sck_pin: 17,
                dout_pin: 27,
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse(&[("HX711_MODE", "c16")]).is_err());
        assert!(parse(&[("HX711_SINGLE", "maybe")]).is_err());
        assert!(parse(&[("HX711_SAMPLES", "-1")]).is_err());
        assert!(parse(&[("HX711_SCK_PIN", "6")]).is_err());
    }
}
