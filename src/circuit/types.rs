//! Type definitions for a circuit row of the schedule of test results.
//!
//! These types deserialize from the loosely-typed values a schedule form
//! produces ("MCB Type B", "1P", "6242Y") and serialize back to canonical
//! labels for exporters.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// One row of the inspection schedule.
///
/// Fields that a form may leave blank are `Option`s; the calculator decides
/// which of them are required and reports `MissingRequiredField` for those.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitSpec {
    /// Unique within a schedule; schedule order is document order
    pub circuit_number: String,
    #[serde(default)]
    pub description: String,
    pub phase_type: Option<PhaseType>,
    /// Explicit topology. When absent, a description mentioning "ring" marks a ring.
    pub topology: Option<Topology>,
    /// Live conductor cross-sectional area (mm²)
    pub live_size_mm2: Option<f64>,
    /// Circuit protective conductor cross-sectional area (mm²)
    pub cpc_size_mm2: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub cable_type: Option<CableType>,
    #[serde(default)]
    pub conductor_material: ConductorMaterial,
    #[serde(default)]
    pub insulation: InsulationType,
    pub protective_device: ProtectiveDevice,
    /// Upstream RCD protection. An RCBO is RCD-protected without this.
    pub rcd: Option<RcdProtection>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub reference_method: Option<ReferenceMethod>,
    /// Route length in metres; for a ring, the total length of the ring cable
    pub length_m: Option<f64>,
    /// External earth fault loop impedance (Ze) at the origin, in ohms
    pub ze_ohms: Option<f64>,
    #[serde(default)]
    pub voltage_band: VoltageBand,
}

impl CircuitSpec {
    /// A circuit with only its number and protective device recorded.
    pub fn new(circuit_number: impl Into<String>, protective_device: ProtectiveDevice) -> Self {
        Self {
            circuit_number: circuit_number.into(),
            description: String::new(),
            phase_type: None,
            topology: None,
            live_size_mm2: None,
            cpc_size_mm2: None,
            cable_type: None,
            conductor_material: ConductorMaterial::default(),
            insulation: InsulationType::default(),
            protective_device,
            rcd: None,
            reference_method: None,
            length_m: None,
            ze_ohms: None,
            voltage_band: VoltageBand::default(),
        }
    }

    /// True for ring final circuits.
    pub fn is_ring(&self) -> bool {
        match self.topology {
            Some(topology) => topology == Topology::Ring,
            None => self
                .description
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == "ring"),
        }
    }

    /// True when the circuit's fault current path passes through an RCD.
    pub fn is_rcd_protected(&self) -> bool {
        self.rcd.is_some() || self.protective_device.kind == DeviceKind::Rcbo
    }

    /// Circuits that normally need 30 mA additional protection (Regulations
    /// 411.3.3, 701.411.3.3 and 522.6.202): socket-outlets, bathrooms and
    /// circuits supplying outdoor equipment.
    pub fn requires_additional_protection(&self) -> bool {
        let description = self.description.to_lowercase();
        ["socket", "bathroom", "shower room", "outdoor", "garden"]
            .iter()
            .any(|keyword| description.contains(keyword))
    }
}

/// Supply phase configuration of the circuit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PhaseType {
    #[serde(rename = "single", alias = "1P", alias = "single-phase")]
    Single,
    #[serde(rename = "three", alias = "3P", alias = "three-phase")]
    Three,
}

impl fmt::Display for PhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseType::Single => write!(f, "single-phase"),
            PhaseType::Three => write!(f, "three-phase"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Radial,
    Ring,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConductorMaterial {
    #[default]
    Copper,
    #[serde(alias = "aluminum")]
    Aluminium,
}

/// Conductor insulation, which fixes the maximum operating temperature.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum InsulationType {
    /// 70 °C thermoplastic (PVC)
    #[default]
    #[serde(rename = "thermoplastic_70", alias = "pvc")]
    Thermoplastic70,
    /// 90 °C thermosetting (XLPE, LSZH)
    #[serde(rename = "thermosetting_90", alias = "xlpe")]
    Thermosetting90,
}

/// Voltage band of the circuit, which selects the insulation test voltage
/// and minimum insulation resistance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VoltageBand {
    #[serde(rename = "selv_pelv")]
    SelvPelv,
    #[default]
    #[serde(rename = "low_voltage")]
    LowVoltage,
    #[serde(rename = "above_500v")]
    Above500V,
}

/// Time/current characteristic of an MCB or RCBO.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TripCurve {
    B,
    C,
    D,
    Other(String),
}

impl TripCurve {
    /// Parse a curve label such as "B", "Type C" or "type 3".
    ///
    /// The numbered types 1/2/3 are the old UK designations for B/C/D.
    pub fn from_label(input: &str) -> TripCurve {
        let upper = input.trim().to_uppercase();
        let stripped = upper
            .strip_prefix("TYPE")
            .map(str::trim)
            .unwrap_or(upper.as_str());

        match stripped {
            "B" | "1" => TripCurve::B,
            "C" | "2" => TripCurve::C,
            "D" | "3" => TripCurve::D,
            _ => TripCurve::Other(input.trim().to_string()),
        }
    }
}

impl From<String> for TripCurve {
    fn from(value: String) -> Self {
        TripCurve::from_label(&value)
    }
}

impl From<TripCurve> for String {
    fn from(value: TripCurve) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TripCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripCurve::B => write!(f, "B"),
            TripCurve::C => write!(f, "C"),
            TripCurve::D => write!(f, "D"),
            TripCurve::Other(label) => write!(f, "{}", label),
        }
    }
}

/// Product standard of a fuse, which selects its Table 41.2 column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FuseStandard {
    /// General purpose gG fuse links, fuse systems E and G
    Bs88_2,
    /// Domestic fuse links, fuse system C
    Bs88_3,
    /// Cartridge fuses for domestic consumer units
    Bs1361,
    /// Semi-enclosed rewirable fuses
    Bs3036,
}

impl FuseStandard {
    /// Recognise a fuse standard in labels such as "BS 88-2", "BS88:3",
    /// "BS EN 60269-2" or "rewirable".
    pub fn from_label(input: &str) -> Option<FuseStandard> {
        let compact: String = input
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if compact.contains("3036") || compact.contains("REWIRABLE") {
            Some(FuseStandard::Bs3036)
        } else if compact.contains("1361") {
            Some(FuseStandard::Bs1361)
        } else if compact.contains("88-3") || compact.contains("88:3") || compact.contains("60269-3") {
            Some(FuseStandard::Bs88_3)
        } else if compact.contains("BS88") || compact.contains("60269") {
            Some(FuseStandard::Bs88_2)
        } else {
            None
        }
    }
}

impl fmt::Display for FuseStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FuseStandard::Bs88_2 => "BS 88-2",
            FuseStandard::Bs88_3 => "BS 88-3",
            FuseStandard::Bs1361 => "BS 1361",
            FuseStandard::Bs3036 => "BS 3036",
        };
        write!(f, "{}", label)
    }
}

/// Overcurrent protective device family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceKind {
    /// Circuit-breaker to BS EN 60898
    Mcb,
    /// RCD with integral overcurrent protection to BS EN 61009
    Rcbo,
    Fuse(FuseStandard),
    Other(String),
}

impl DeviceKind {
    /// Parse a device description such as "MCB Type B", "RCBO (BS EN 61009)"
    /// or "BS 88-3 fuse".
    ///
    /// RCBO is checked before MCB so "RCBO/MCB" style labels land on RCBO.
    /// A fuse with no recognisable standard is taken to be BS 1361.
    pub fn from_label(input: &str) -> DeviceKind {
        let upper = input.to_uppercase();
        if upper.contains("RCBO") || upper.contains("61009") {
            DeviceKind::Rcbo
        } else if upper.contains("MCB") || upper.contains("60898") {
            DeviceKind::Mcb
        } else if let Some(standard) = FuseStandard::from_label(input) {
            DeviceKind::Fuse(standard)
        } else if upper.contains("FUSE") {
            DeviceKind::Fuse(FuseStandard::Bs1361)
        } else {
            DeviceKind::Other(input.trim().to_string())
        }
    }

    /// Product standard for the device family, if catalogued.
    pub fn standard(&self) -> Option<String> {
        match self {
            DeviceKind::Mcb => Some("BS EN 60898".to_string()),
            DeviceKind::Rcbo => Some("BS EN 61009".to_string()),
            DeviceKind::Fuse(standard) => Some(standard.to_string()),
            DeviceKind::Other(_) => None,
        }
    }
}

impl From<String> for DeviceKind {
    fn from(value: String) -> Self {
        DeviceKind::from_label(&value)
    }
}

impl From<DeviceKind> for String {
    fn from(value: DeviceKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Mcb => write!(f, "MCB"),
            DeviceKind::Rcbo => write!(f, "RCBO"),
            DeviceKind::Fuse(standard) => write!(f, "{} fuse", standard),
            DeviceKind::Other(label) => write!(f, "{}", label),
        }
    }
}

/// The circuit's overcurrent protective device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveDevice {
    pub kind: DeviceKind,
    /// Circuit-breaker curve; fuses have none
    #[serde(default, deserialize_with = "blank_as_none")]
    pub curve: Option<TripCurve>,
    pub rating_amps: Option<u32>,
}

impl ProtectiveDevice {
    pub fn mcb(curve: TripCurve, rating_amps: u32) -> Self {
        Self {
            kind: DeviceKind::Mcb,
            curve: Some(curve),
            rating_amps: Some(rating_amps),
        }
    }

    pub fn rcbo(curve: TripCurve, rating_amps: u32) -> Self {
        Self {
            kind: DeviceKind::Rcbo,
            curve: Some(curve),
            rating_amps: Some(rating_amps),
        }
    }

    pub fn fuse(standard: FuseStandard, rating_amps: u32) -> Self {
        Self {
            kind: DeviceKind::Fuse(standard),
            curve: None,
            rating_amps: Some(rating_amps),
        }
    }
}

impl fmt::Display for ProtectiveDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        let curve = match self.kind {
            DeviceKind::Fuse(_) => None,
            _ => self.curve.as_ref(),
        };
        match (curve, self.rating_amps) {
            (Some(curve), Some(rating)) => write!(f, " {}{}", curve, rating),
            (Some(curve), None) => write!(f, " {}", curve),
            (None, Some(rating)) => write!(f, " {}A", rating),
            (None, None) => Ok(()),
        }
    }
}

/// RCD type by the residual current waveforms it detects.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RcdType {
    #[serde(rename = "AC")]
    Ac,
    #[default]
    A,
    F,
    B,
    /// Time-delayed (selective)
    S,
}

impl RcdType {
    pub fn is_selective(&self) -> bool {
        matches!(self, RcdType::S)
    }
}

impl fmt::Display for RcdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RcdType::Ac => "AC",
            RcdType::A => "A",
            RcdType::F => "F",
            RcdType::B => "B",
            RcdType::S => "S",
        };
        write!(f, "Type {}", label)
    }
}

/// Residual current protection covering the circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcdProtection {
    /// Rated residual operating current IΔn in mA
    pub residual_current_ma: Option<u32>,
    #[serde(default)]
    pub rcd_type: RcdType,
}

/// Cable construction, used to infer the CPC size of composite cables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CableType {
    /// Flat twin-and-earth, 6242Y / 6242B
    TwinAndEarth,
    /// Single-core cables in conduit or trunking
    Singles,
    /// Steel wire armoured
    Armoured,
    Other(String),
}

impl CableType {
    pub fn from_label(input: &str) -> CableType {
        let upper = input.to_uppercase();
        if upper.contains("TWIN") || upper.contains("6242") || upper.contains("T&E") {
            CableType::TwinAndEarth
        } else if upper.contains("SWA") || upper.contains("ARMOUR") {
            CableType::Armoured
        } else if upper.contains("SINGLE") || upper.contains("6491") {
            CableType::Singles
        } else {
            CableType::Other(input.trim().to_string())
        }
    }
}

impl From<String> for CableType {
    fn from(value: String) -> Self {
        CableType::from_label(&value)
    }
}

impl From<CableType> for String {
    fn from(value: CableType) -> Self {
        match value {
            CableType::TwinAndEarth => "twin_and_earth".to_string(),
            CableType::Singles => "singles".to_string(),
            CableType::Armoured => "armoured".to_string(),
            CableType::Other(label) => label,
        }
    }
}

/// Installation reference method (Appendix 4, Table 4A2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReferenceMethod {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    /// Installation methods 100-103 (cables in or near thermal insulation)
    ThermalInsulation(u16),
    Other(String),
}

impl ReferenceMethod {
    /// Parse "C", "Method C", "clipped direct", "103" and similar labels.
    pub fn from_label(input: &str) -> ReferenceMethod {
        let trimmed = input.trim();
        let upper = trimmed.to_uppercase();
        let mut stripped = upper.as_str();
        for prefix in ["REFERENCE", "METHOD"] {
            if let Some(rest) = stripped.trim_start().strip_prefix(prefix) {
                stripped = rest;
            }
        }
        let stripped = stripped.trim();

        if let Ok(number) = stripped.parse::<u16>() {
            if (100..=103).contains(&number) {
                return ReferenceMethod::ThermalInsulation(number);
            }
        }

        match stripped {
            "A" => ReferenceMethod::A,
            "B" => ReferenceMethod::B,
            "C" => ReferenceMethod::C,
            "D" | "D1" | "D2" => ReferenceMethod::D,
            "E" => ReferenceMethod::E,
            "F" => ReferenceMethod::F,
            "G" => ReferenceMethod::G,
            _ if upper.contains("CLIPPED") => ReferenceMethod::C,
            _ => ReferenceMethod::Other(trimmed.to_string()),
        }
    }

    /// Short description for guidance text.
    pub fn description(&self) -> String {
        match self {
            ReferenceMethod::A => "reference method A, enclosed in conduit in a thermally insulating wall".to_string(),
            ReferenceMethod::B => "reference method B, enclosed in conduit or trunking on a wall".to_string(),
            ReferenceMethod::C => "reference method C, clipped direct".to_string(),
            ReferenceMethod::D => "reference method D, in the ground".to_string(),
            ReferenceMethod::E | ReferenceMethod::F | ReferenceMethod::G => {
                format!("reference method {}, in free air or on cable tray", String::from(self.clone()))
            }
            ReferenceMethod::ThermalInsulation(number) => {
                format!("installation method {}, in contact with thermal insulation", number)
            }
            ReferenceMethod::Other(label) => format!("installation method '{}'", label),
        }
    }
}

impl From<String> for ReferenceMethod {
    fn from(value: String) -> Self {
        ReferenceMethod::from_label(&value)
    }
}

impl From<ReferenceMethod> for String {
    fn from(value: ReferenceMethod) -> Self {
        match value {
            ReferenceMethod::A => "A".to_string(),
            ReferenceMethod::B => "B".to_string(),
            ReferenceMethod::C => "C".to_string(),
            ReferenceMethod::D => "D".to_string(),
            ReferenceMethod::E => "E".to_string(),
            ReferenceMethod::F => "F".to_string(),
            ReferenceMethod::G => "G".to_string(),
            ReferenceMethod::ThermalInsulation(number) => number.to_string(),
            ReferenceMethod::Other(label) => label,
        }
    }
}

/// Treat a blank form value as absent; schedule forms send `""` for
/// fields the user never filled in.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    Ok(label.filter(|l| !l.trim().is_empty()).map(T::from))
}
