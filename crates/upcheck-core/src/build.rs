//! Build identifiers and imgbase layer names.
//!
//! A build identifier such as `redhat-virtualization-host-4.1-20170522.0`
//! encodes product line, `major.minor` and a `YYYYMMDD.N` build stamp. An
//! imgbase layer such as `rhvh-4.1-0.20170522.0+1` names the layer the host
//! boots into; the `+N` suffix is the layer index on top of the base.

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Parsed `<product>-<major>.<minor>-<YYYYMMDD>.<n>` build identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildId {
    raw: String,
    product: String,
    major: u32,
    minor: u32,
    date: String,
    serial: u32,
}

impl BuildId {
    pub fn parse(input: &str) -> Result<Self, FormatError> {
        let raw = input.trim();
        let invalid = |reason: &str| FormatError::InvalidBuildId {
            input: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut fields = raw.rsplitn(3, '-');
        let stamp = fields.next().ok_or_else(|| invalid("missing build stamp"))?;
        let version = fields.next().ok_or_else(|| invalid("missing version"))?;
        let product = fields
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("missing product"))?;

        let (date, serial) = stamp
            .split_once('.')
            .ok_or_else(|| invalid("build stamp is not YYYYMMDD.N"))?;
        if !is_date_token(date) {
            return Err(invalid("build date is not YYYYMMDD"));
        }
        let serial = serial
            .parse::<u32>()
            .map_err(|_| invalid("build serial is not numeric"))?;

        let (major, minor) = version
            .split_once('.')
            .ok_or_else(|| invalid("version is not major.minor"))?;
        let major = major
            .parse::<u32>()
            .map_err(|_| invalid("major version is not numeric"))?;
        let minor = minor
            .parse::<u32>()
            .map_err(|_| invalid("minor version is not numeric"))?;

        Ok(Self {
            raw: raw.to_string(),
            product: product.to_string(),
            major,
            minor,
            date: date.to_string(),
            serial,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Build date, `YYYYMMDD`.
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// `<major>.<minor>-<YYYYMMDD>.<n>` exactly as written in the build name,
    /// the part carried by the update package (`...-update-4.1-20170522.0...`).
    pub fn version_suffix(&self) -> &str {
        &self.raw[self.product.len() + 1..]
    }

    pub fn is_release(&self, major: u32, minor: u32) -> bool {
        self.major == major && self.minor == minor
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for BuildId {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildId::parse(s)
    }
}

/// Whether the optional new volumes are expected for this build pair.
///
/// True iff `source.date <= threshold < target.date`. Dates are fixed-width
/// `YYYYMMDD`, so string order equals numeric order.
pub fn new_volumes_expected(source: &BuildId, target: &BuildId, threshold: &str) -> bool {
    source.date() <= threshold && target.date() > threshold
}

/// The layer reported by `imgbase w`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImgbaseLayer {
    name: String,
    base: String,
    build_date: String,
}

impl ImgbaseLayer {
    /// Parse the layer from `imgbase w` output (`You are on rhvh-4.1-0.20170522.0+1`).
    pub fn from_imgbase_w(output: &str) -> Result<Self, FormatError> {
        let name = output
            .split_whitespace()
            .last()
            .ok_or_else(|| FormatError::InvalidLayer {
                input: output.trim().to_string(),
                reason: "empty imgbase w output".to_string(),
            })?;
        Self::parse(name)
    }

    /// Parse a bare layer name.
    pub fn parse(name: &str) -> Result<Self, FormatError> {
        let name = name.trim();
        let base = name.split('+').next().unwrap_or(name);
        let build_date = base
            .rsplit('-')
            .next()
            .and_then(|version| version.split('.').find(|part| is_date_token(part)))
            .ok_or_else(|| FormatError::InvalidLayer {
                input: name.to_string(),
                reason: "no YYYYMMDD build date in layer version".to_string(),
            })?;

        Ok(Self {
            name: name.to_string(),
            base: base.to_string(),
            build_date: build_date.to_string(),
        })
    }

    /// Full layer name, e.g. `rhvh-4.1-0.20170522.0+1`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer name with the `+N` suffix stripped, e.g. `rhvh-4.1-0.20170522.0`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn build_date(&self) -> &str {
        &self.build_date
    }

    /// Layer name as it appears in device-mapper paths (`-` doubled).
    pub fn mount_key(&self) -> String {
        self.name.replace('-', "--")
    }
}

impl std::fmt::Display for ImgbaseLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

fn is_date_token(s: &str) -> bool {
    s.len() == 8 && s.chars().all(|c| c.is_ascii_digit())
}
