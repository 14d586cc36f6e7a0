//! Settings for the memory images
//!
//! All field specifications and domain constants are
//! held by a single, immutable [`Settings`] value which
//! is created once at program start (defaults or a
//! .toml file) and passed by reference to every image.
//!

use std::fmt;
use std::fs::File;
use std::io::{
    Read,
    Write,
};
use std::path::Path;
use std::collections::BTreeMap;

use crate::constants::{
    ORBIT_LENGTH,
    DEFAULT_GAP_MARKER,
};
use crate::errors::TdfError;
use crate::fieldspec::{
    FieldSpec,
    ObjectFamily,
};

/// The .toml representation. Everything is optional,
/// missing entries take the defaults.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct SettingsConfig {
  pub orbit_length : Option<u32>,
  pub gap_marker   : Option<String>,
  /// keyed by family name, e.g. "muon"
  #[serde(default)]
  pub families     : BTreeMap<String, FieldSpec>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "SettingsConfig", into = "SettingsConfig")]
pub struct Settings {
  orbit_length : u32,
  gap_marker   : String,
  families     : BTreeMap<ObjectFamily, FieldSpec>,
}

impl Settings {

  pub fn new() -> Self {
    let families = ObjectFamily::ALL.iter()
                                    .map(|f| (*f, f.default_spec()))
                                    .collect();
    Self {
      orbit_length : ORBIT_LENGTH,
      gap_marker   : String::from(DEFAULT_GAP_MARKER),
      families     : families,
    }
  }

  pub fn from_config(config : SettingsConfig) -> Result<Self, TdfError> {
    let mut settings = Self::new();
    if let Some(orbit_length) = config.orbit_length {
      if orbit_length == 0 {
        return Err(TdfError::InvalidLayout(String::from("orbit_length has to be at least 1")));
      }
      settings.orbit_length = orbit_length;
    }
    if let Some(marker) = config.gap_marker {
      settings.gap_marker = marker.to_lowercase();
    }
    for (name, spec) in config.families {
      match ObjectFamily::from_name(&name) {
        None => {
          error!("Unknown object family '{}' in settings!", name);
          return Err(TdfError::UnknownKey {
            source : String::from("settings"),
            key    : name,
          });
        }
        Some(family) => {
          settings.families.insert(family, spec);
        }
      }
    }
    Ok(settings)
  }

  /// Replace the orbit length, e.g. for short test patterns
  pub fn with_orbit_length(mut self, orbit_length : u32) -> Result<Self, TdfError> {
    if orbit_length == 0 {
      return Err(TdfError::InvalidLayout(String::from("orbit_length has to be at least 1")));
    }
    self.orbit_length = orbit_length;
    Ok(self)
  }

  pub fn with_spec(mut self, family : ObjectFamily, spec : FieldSpec) -> Self {
    self.families.insert(family, spec);
    self
  }

  /// An empty marker disables the resync gap rule
  pub fn with_gap_marker(mut self, marker : &str) -> Self {
    self.gap_marker = marker.to_lowercase();
    self
  }

  /// Number of BX per orbit, the blocksize of all snapshots
  pub fn orbit_length(&self) -> u32 {
    self.orbit_length
  }

  pub fn gap_marker(&self) -> &str {
    &self.gap_marker
  }

  pub fn spec(&self, family : ObjectFamily) -> &FieldSpec {
    // every family is inserted in new() and never removed
    &self.families[&family]
  }

  /// Load settings from a .toml file
  pub fn from_toml(filename : &Path) -> Result<Settings, TdfError> {
    let mut file = match File::open(filename) {
      Err(err) => {
        error!("Unable to open {}! {}", filename.display(), err);
        return Err(TdfError::Io(err));
      }
      Ok(file) => file
    };
    let mut toml_string = String::new();
    file.read_to_string(&mut toml_string)?;
    Self::from_toml_str(&toml_string)
  }

  pub fn from_toml_str(toml_string : &str) -> Result<Settings, TdfError> {
    match toml::from_str::<Settings>(toml_string) {
      Err(err) => {
        error!("Can't interpret toml! {}", err);
        Err(TdfError::TomlDecoding(err.to_string()))
      }
      Ok(settings) => {
        debug!("Loaded settings, orbit length {}", settings.orbit_length);
        Ok(settings)
      }
    }
  }

  /// Write the settings to a .toml file
  pub fn to_toml(&self, filename : &Path) -> Result<(), TdfError> {
    info!("Will write settings to file {}!", filename.display());
    let toml_string = match toml::to_string_pretty(&self) {
      Err(err) => {
        error!("Unable to serialize toml! {err}");
        return Err(TdfError::TomlDecoding(err.to_string()));
      }
      Ok(toml_string) => toml_string
    };
    let mut file = File::create(filename)?;
    file.write_all(toml_string.as_bytes())?;
    Ok(())
  }
}

impl Default for Settings {
  fn default() -> Self {
    Self::new()
  }
}

impl TryFrom<SettingsConfig> for Settings {
  type Error = TdfError;

  fn try_from(config : SettingsConfig) -> Result<Self, Self::Error> {
    Self::from_config(config)
  }
}

impl From<Settings> for SettingsConfig {
  fn from(settings : Settings) -> Self {
    Self {
      orbit_length : Some(settings.orbit_length),
      gap_marker   : Some(settings.gap_marker),
      families     : settings.families.into_iter()
                                      .map(|(f, spec)| (f.name().to_string(), spec))
                                      .collect(),
    }
  }
}

impl fmt::Display for Settings {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<Settings:");
    repr += &(format!("\n  orbit length : {}", self.orbit_length));
    repr += &(format!("\n  gap marker   : '{}'", self.gap_marker));
    for (family, spec) in &self.families {
      repr += &(format!("\n  {:<10} : {} x {} bit", family, spec.count(), spec.width()));
    }
    write!(f, "{}>", repr)
  }
}

#[cfg(test)]
mod test_settings {
  use super::*;

  #[test]
  fn defaults_cover_all_families() {
    let settings = Settings::default();
    for family in ObjectFamily::ALL {
      assert_eq!(settings.spec(family), &family.default_spec());
    }
    assert_eq!(settings.orbit_length(), ORBIT_LENGTH);
  }

  #[test]
  fn partial_toml_keeps_defaults() {
    let repr = "orbit_length = 16\ngap_marker = \"DEAD\"\n[families.eg]\ncount = 4\nwidth = 32\n";
    let settings = Settings::from_toml_str(repr).unwrap();
    assert_eq!(settings.orbit_length(), 16);
    assert_eq!(settings.gap_marker(), "dead");
    assert_eq!(settings.spec(ObjectFamily::Eg).count(), 4);
    assert_eq!(settings.spec(ObjectFamily::Muon).count(), 8);
  }

  #[test]
  fn zero_orbit_is_rejected() {
    assert!(Settings::from_toml_str("orbit_length = 0\n").is_err());
    assert!(Settings::new().with_orbit_length(0).is_err());
  }

  #[test]
  fn unknown_family_is_rejected() {
    assert!(Settings::from_toml_str("[families.photon]\ncount = 1\nwidth = 32\n").is_err());
  }

  #[test]
  fn wide_subfield_is_rejected() {
    let repr = "[families.etmhf]\ncount = 1\nwidth = 256\ncoding = { wide = [99, 0] }\n";
    match Settings::from_toml_str(repr) {
      Err(TdfError::TomlDecoding(reason)) => assert!(reason.contains("wider than 64 bits")),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn toml_round_trip() {
    let settings = Settings::new().with_orbit_length(128).unwrap();
    let repr     = toml::to_string_pretty(&settings).unwrap();
    assert_eq!(Settings::from_toml_str(&repr).unwrap(), settings);
  }
}
