#[macro_use]
pub mod logger;

use hiro_system_kit::slog::Logger;

#[derive(Clone)]
pub struct Context {
    pub logger: Option<Logger>,
    pub tracer: bool,
}

impl Context {
    pub fn empty() -> Context {
        Context {
            logger: None,
            tracer: false,
        }
    }

    pub fn try_log<F>(&self, closure: F)
    where
        F: FnOnce(&Logger),
    {
        if let Some(ref logger) = self.logger {
            closure(logger)
        }
    }

    /// Returns a context that only logs when `enabled` is set, so that
    /// components can be silenced from configuration.
    pub fn scoped(&self, enabled: bool) -> Context {
        match enabled {
            true => self.clone(),
            false => Context::empty(),
        }
    }
}

/// Strips an optional `0x` prefix and lowercases a hex identifier.
pub fn normalize_hex_identifier(value: &str) -> String {
    value
        .strip_prefix("0x")
        .unwrap_or(value)
        .to_ascii_lowercase()
}

/// Decodes a `0x`-prefixed, even-length hex string.
pub fn decode_prefixed_hex(value: &str) -> Result<Vec<u8>, String> {
    let Some(digits) = value.strip_prefix("0x") else {
        return Err(format!("hex string {} is missing its 0x prefix", value));
    };
    if digits.len() % 2 != 0 {
        return Err(format!("hex string {} has an odd length", value));
    }
    hex::decode(digits).map_err(|e| format!("unable to decode hex string: {}", e))
}
