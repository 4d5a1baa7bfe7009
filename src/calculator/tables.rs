//! BS 7671 reference tables for the calculator.
//!
//! Provides two loading methods:
//! - `default_tables()` - Loads the tables compiled into the binary
//! - `load_tables(path)` - Loads a replacement document from a file path
//!
//! Both go through the same validation, so a table with mismatched columns,
//! an unknown curve or an unknown fuse standard is rejected at load time rather than producing a
//! wrong number later.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use super::types::{InsulationRequirement, Megaohms, Ohms, RcdTripBand};
use crate::circuit::{ConductorMaterial, FuseStandard, InsulationType, TripCurve, VoltageBand};

/// Default tables embedded in the binary at compile time.
/// These are loaded from `config/reference_tables.toml`.
const DEFAULT_TABLES: &str = include_str!("../../config/reference_tables.toml");

/// Size comparison tolerance for catalogued cross-sections (mm²).
const SIZE_EPSILON: f64 = 1e-6;

// =============================================================================
// DOCUMENT TYPES (deserialized from TOML)
// =============================================================================

#[derive(Debug, Deserialize)]
struct TablesDocument {
    edition: String,
    zs: ZsSection,
    conductors: Vec<ConductorSection>,
    operating_temperature: OperatingTemperature,
    twin_and_earth: TwinAndEarthSection,
    insulation: Vec<InsulationSection>,
    rcd: RcdSection,
    estimation: Estimation,
    tolerances: Tolerances,
}

#[derive(Debug, Deserialize)]
struct ZsSection {
    measured_correction_factor: f64,
    curves: Vec<ZsCurveSection>,
    #[serde(default)]
    fuses: Vec<ZsFuseSection>,
}

#[derive(Debug, Deserialize)]
struct ZsCurveSection {
    curve: String,
    ratings_a: Vec<u32>,
    max_ohms: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ZsFuseSection {
    standard: String,
    ratings_a: Vec<u32>,
    max_ohms: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ConductorSection {
    material: ConductorMaterial,
    sizes_mm2: Vec<f64>,
    milliohms_per_metre: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct TwinAndEarthSection {
    live_mm2: Vec<f64>,
    cpc_mm2: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct InsulationSection {
    band: VoltageBand,
    test_voltage_v: u32,
    minimum_megaohms: f64,
}

#[derive(Debug, Deserialize)]
struct RcdSection {
    residual_ratings_ma: Vec<u32>,
    additional_protection_max_ma: u32,
    assumed_rcbo_residual_ma: u32,
    trip_bands: Vec<TripBandSection>,
}

#[derive(Debug, Deserialize)]
struct TripBandSection {
    selective: bool,
    multiple: f64,
    must_trip: bool,
    #[serde(default)]
    min_ms: Option<u32>,
    #[serde(default)]
    max_ms: Option<u32>,
}

/// Multipliers from 20 °C to maximum conductor operating temperature.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct OperatingTemperature {
    pub thermoplastic_70: f64,
    pub thermosetting_90: f64,
}

/// Nominal lengths used when a circuit has none recorded.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Estimation {
    pub nominal_radial_length_m: f64,
    pub nominal_ring_length_m: f64,
}

/// Acceptance tolerances applied to measured continuity values.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Tolerances {
    pub r1r2_ohms: f64,
    pub ring_end_to_end_ohms: f64,
}

// =============================================================================
// VALIDATED TABLES
// =============================================================================

/// Immutable, validated reference tables.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    edition: String,
    max_zs: BTreeMap<(TripCurve, u32), f64>,
    fuse_max_zs: BTreeMap<(FuseStandard, u32), f64>,
    zs_correction_factor: f64,
    conductors: HashMap<ConductorMaterial, Vec<(f64, f64)>>,
    operating_temperature: OperatingTemperature,
    twin_and_earth: Vec<(f64, f64)>,
    insulation: HashMap<VoltageBand, InsulationRequirement>,
    residual_ratings_ma: Vec<u32>,
    additional_protection_max_ma: u32,
    assumed_rcbo_residual_ma: u32,
    general_bands: Vec<RcdTripBand>,
    selective_bands: Vec<RcdTripBand>,
    estimation: Estimation,
    tolerances: Tolerances,
}

/// Serializable overview of what the tables catalogue.
#[derive(Debug, Clone, Serialize)]
pub struct TablesSummary {
    pub edition: String,
    pub device_ratings: BTreeMap<String, Vec<u32>>,
    pub conductor_sizes_mm2: BTreeMap<String, Vec<f64>>,
    pub residual_ratings_ma: Vec<u32>,
    pub zs_correction_factor: f64,
    pub estimation: Estimation,
    pub tolerances: Tolerances,
}

impl ReferenceTables {
    /// Edition of BS 7671 the tables were taken from.
    pub fn edition(&self) -> &str {
        &self.edition
    }

    /// Tabulated maximum Zs for a curve/rating, if catalogued.
    pub fn max_zs(&self, curve: &TripCurve, rating_amps: u32) -> Option<Ohms> {
        self.max_zs
            .get(&(curve.clone(), rating_amps))
            .copied()
            .map(Ohms)
    }

    /// Tabulated maximum Zs for a fuse (Table 41.2), if catalogued.
    pub fn fuse_max_zs(&self, standard: FuseStandard, rating_amps: u32) -> Option<Ohms> {
        self.fuse_max_zs.get(&(standard, rating_amps)).copied().map(Ohms)
    }

    pub fn zs_correction_factor(&self) -> f64 {
        self.zs_correction_factor
    }

    /// Resistance at 20 °C in milliohms per metre.
    pub fn resistance_per_metre(&self, material: ConductorMaterial, size_mm2: f64) -> Option<f64> {
        self.conductors
            .get(&material)?
            .iter()
            .find(|(size, _)| (size - size_mm2).abs() < SIZE_EPSILON)
            .map(|(_, milliohms)| *milliohms)
    }

    pub fn temperature_multiplier(&self, insulation: InsulationType) -> f64 {
        match insulation {
            InsulationType::Thermoplastic70 => self.operating_temperature.thermoplastic_70,
            InsulationType::Thermosetting90 => self.operating_temperature.thermosetting_90,
        }
    }

    /// CPC size of twin-and-earth cable for a live conductor size.
    pub fn twin_and_earth_cpc(&self, live_mm2: f64) -> Option<f64> {
        self.twin_and_earth
            .iter()
            .find(|(live, _)| (live - live_mm2).abs() < SIZE_EPSILON)
            .map(|(_, cpc)| *cpc)
    }

    pub fn insulation(&self, band: VoltageBand) -> InsulationRequirement {
        // Every band is present: `from_document` refuses tables without one.
        self.insulation[&band]
    }

    pub fn is_catalogued_residual(&self, residual_current_ma: u32) -> bool {
        self.residual_ratings_ma.contains(&residual_current_ma)
    }

    pub fn assumed_rcbo_residual_ma(&self) -> u32 {
        self.assumed_rcbo_residual_ma
    }

    /// Trip-time bands for an RCD, in ascending test-current order.
    ///
    /// The 5×IΔn band only applies to devices rated for additional protection.
    pub fn rcd_bands(&self, selective: bool, residual_current_ma: u32) -> Vec<RcdTripBand> {
        let bands = if selective {
            &self.selective_bands
        } else {
            &self.general_bands
        };
        bands
            .iter()
            .filter(|band| {
                band.multiple <= 1.0 || residual_current_ma <= self.additional_protection_max_ma
            })
            .copied()
            .collect()
    }

    pub fn nominal_length_m(&self, ring: bool) -> f64 {
        if ring {
            self.estimation.nominal_ring_length_m
        } else {
            self.estimation.nominal_radial_length_m
        }
    }

    pub fn tolerances(&self) -> Tolerances {
        self.tolerances
    }

    pub fn summary(&self) -> TablesSummary {
        let mut device_ratings: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for (curve, rating) in self.max_zs.keys() {
            device_ratings.entry(curve.to_string()).or_default().push(*rating);
        }
        for (standard, rating) in self.fuse_max_zs.keys() {
            device_ratings
                .entry(format!("{} fuse", standard))
                .or_default()
                .push(*rating);
        }

        let conductor_sizes_mm2 = self
            .conductors
            .iter()
            .map(|(material, rows)| {
                let name = match material {
                    ConductorMaterial::Copper => "copper",
                    ConductorMaterial::Aluminium => "aluminium",
                };
                (name.to_string(), rows.iter().map(|(size, _)| *size).collect())
            })
            .collect();

        TablesSummary {
            edition: self.edition.clone(),
            device_ratings,
            conductor_sizes_mm2,
            residual_ratings_ma: self.residual_ratings_ma.clone(),
            zs_correction_factor: self.zs_correction_factor,
            estimation: self.estimation,
            tolerances: self.tolerances,
        }
    }

    fn from_document(doc: TablesDocument) -> Result<Self> {
        ensure!(!doc.edition.trim().is_empty(), "edition must not be empty");
        ensure!(
            doc.zs.measured_correction_factor > 0.0 && doc.zs.measured_correction_factor <= 1.0,
            "zs.measured_correction_factor must be in (0, 1], got {}",
            doc.zs.measured_correction_factor
        );

        let mut max_zs = BTreeMap::new();
        for section in &doc.zs.curves {
            let curve = TripCurve::from_label(&section.curve);
            if let TripCurve::Other(label) = &curve {
                bail!("zs.curves: unknown curve '{}'", label);
            }
            let rows = zip_columns(
                &format!("zs curve {}", curve),
                &section.ratings_a,
                &section.max_ohms,
            )?;
            for (rating, ohms) in rows {
                if max_zs.insert((curve.clone(), rating), ohms).is_some() {
                    bail!("zs curve {}: rating {}A listed twice", curve, rating);
                }
            }
        }

        let mut fuse_max_zs = BTreeMap::new();
        for section in &doc.zs.fuses {
            let standard = FuseStandard::from_label(&section.standard)
                .ok_or_else(|| anyhow!("zs.fuses: unknown fuse standard '{}'", section.standard))?;
            let rows = zip_columns(
                &format!("zs fuse {}", standard),
                &section.ratings_a,
                &section.max_ohms,
            )?;
            for (rating, ohms) in rows {
                if fuse_max_zs.insert((standard, rating), ohms).is_some() {
                    bail!("zs fuse {}: rating {}A listed twice", standard, rating);
                }
            }
        }

        let mut conductors = HashMap::new();
        for section in &doc.conductors {
            let rows = zip_columns(
                &format!("conductors {:?}", section.material),
                &section.sizes_mm2,
                &section.milliohms_per_metre,
            )?;
            if conductors.insert(section.material, rows).is_some() {
                bail!("conductors: material {:?} listed twice", section.material);
            }
        }

        let twin_and_earth = zip_columns(
            "twin_and_earth",
            &doc.twin_and_earth.live_mm2,
            &doc.twin_and_earth.cpc_mm2,
        )?;

        let mut insulation = HashMap::new();
        for section in &doc.insulation {
            ensure!(
                section.minimum_megaohms > 0.0 && section.test_voltage_v > 0,
                "insulation {:?}: values must be positive",
                section.band
            );
            insulation.insert(
                section.band,
                InsulationRequirement {
                    test_voltage_v: section.test_voltage_v,
                    minimum: Megaohms(section.minimum_megaohms),
                },
            );
        }
        for band in [VoltageBand::SelvPelv, VoltageBand::LowVoltage, VoltageBand::Above500V] {
            ensure!(insulation.contains_key(&band), "insulation: no entry for {:?}", band);
        }

        let (mut selective_bands, mut general_bands): (Vec<_>, Vec<_>) = doc
            .rcd
            .trip_bands
            .iter()
            .partition(|band| band.selective);
        ensure!(
            !general_bands.is_empty() && !selective_bands.is_empty(),
            "rcd.trip_bands must cover general and selective devices"
        );
        selective_bands.sort_by(|a, b| a.multiple.total_cmp(&b.multiple));
        general_bands.sort_by(|a, b| a.multiple.total_cmp(&b.multiple));

        ensure!(
            doc.rcd
                .residual_ratings_ma
                .contains(&doc.rcd.assumed_rcbo_residual_ma),
            "rcd.assumed_rcbo_residual_ma must be a catalogued residual rating"
        );
        ensure!(
            doc.estimation.nominal_radial_length_m > 0.0 && doc.estimation.nominal_ring_length_m > 0.0,
            "estimation lengths must be positive"
        );

        Ok(Self {
            edition: doc.edition,
            max_zs,
            fuse_max_zs,
            zs_correction_factor: doc.zs.measured_correction_factor,
            conductors,
            operating_temperature: doc.operating_temperature,
            twin_and_earth,
            insulation,
            residual_ratings_ma: doc.rcd.residual_ratings_ma,
            additional_protection_max_ma: doc.rcd.additional_protection_max_ma,
            assumed_rcbo_residual_ma: doc.rcd.assumed_rcbo_residual_ma,
            general_bands: general_bands.into_iter().map(to_band).collect(),
            selective_bands: selective_bands.into_iter().map(to_band).collect(),
            estimation: doc.estimation,
            tolerances: doc.tolerances,
        })
    }
}

fn to_band(section: &TripBandSection) -> RcdTripBand {
    RcdTripBand {
        multiple: section.multiple,
        must_trip: section.must_trip,
        min_ms: section.min_ms,
        max_ms: section.max_ms,
    }
}

/// Pair up two table columns, rejecting mismatched lengths and non-positive values.
fn zip_columns<K: Copy>(name: &str, keys: &[K], values: &[f64]) -> Result<Vec<(K, f64)>> {
    if keys.len() != values.len() {
        return Err(anyhow!(
            "{}: {} keys but {} values",
            name,
            keys.len(),
            values.len()
        ));
    }
    ensure!(!keys.is_empty(), "{}: table is empty", name);
    ensure!(
        values.iter().all(|v| v.is_finite() && *v > 0.0),
        "{}: values must be positive",
        name
    );
    Ok(keys.iter().copied().zip(values.iter().copied()).collect())
}

/// Parse and validate a tables document.
pub fn parse_tables(content: &str) -> Result<ReferenceTables> {
    let doc: TablesDocument = toml::from_str(content).context("invalid reference tables TOML")?;
    ReferenceTables::from_document(doc)
}

/// Load tables from a TOML file at the given path.
///
/// # Example
/// ```ignore
/// let tables = load_tables(Path::new("/path/to/amendment_3.toml"))?;
/// let calculator = Calculator::new(tables);
/// ```
pub fn load_tables(path: &Path) -> Result<ReferenceTables> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read reference tables from {}", path.display()))?;
    parse_tables(&content)
}

/// Get the default tables embedded in the binary.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a build-time bug,
/// covered by `test_default_tables_load`).
pub fn default_tables() -> ReferenceTables {
    parse_tables(DEFAULT_TABLES).expect("embedded reference_tables.toml must be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_load() {
        let tables = default_tables();
        assert_eq!(tables.edition(), "BS 7671:2018+A2:2022");
        assert_eq!(tables.zs_correction_factor(), 0.8);
    }

    #[test]
    fn test_table_41_3_values() {
        let tables = default_tables();
        assert_eq!(tables.max_zs(&TripCurve::B, 32), Some(Ohms(1.37)));
        assert_eq!(tables.max_zs(&TripCurve::B, 6), Some(Ohms(7.28)));
        assert_eq!(tables.max_zs(&TripCurve::C, 16), Some(Ohms(1.37)));
        assert_eq!(tables.max_zs(&TripCurve::D, 40), Some(Ohms(0.27)));
        assert_eq!(tables.max_zs(&TripCurve::B, 33), None);
        assert_eq!(tables.max_zs(&TripCurve::Other("Z".to_string()), 32), None);
    }

    #[test]
    fn test_table_41_2_fuse_values() {
        let tables = default_tables();
        assert_eq!(tables.fuse_max_zs(FuseStandard::Bs88_2, 32), Some(Ohms(1.04)));
        assert_eq!(tables.fuse_max_zs(FuseStandard::Bs88_3, 32), Some(Ohms(0.85)));
        assert_eq!(tables.fuse_max_zs(FuseStandard::Bs1361, 45), Some(Ohms(0.60)));
        assert_eq!(tables.fuse_max_zs(FuseStandard::Bs3036, 30), Some(Ohms(1.04)));
        assert_eq!(tables.fuse_max_zs(FuseStandard::Bs3036, 32), None);

        let summary = tables.summary();
        assert_eq!(summary.device_ratings["BS 1361 fuse"], vec![5, 15, 20, 30, 45]);
        assert_eq!(summary.device_ratings["B"].len(), 12);
    }

    #[test]
    fn test_unknown_fuse_standard_rejected() {
        let broken = DEFAULT_TABLES.replacen("standard = \"BS 3036\"", "standard = \"BS 1234\"", 1);
        let err = parse_tables(&broken).unwrap_err();
        assert!(err.to_string().contains("unknown fuse standard 'BS 1234'"), "{}", err);
    }

    #[test]
    fn test_duplicate_fuse_rating_rejected() {
        let broken = DEFAULT_TABLES.replacen("ratings_a = [5, 15, 20, 30, 45]", "ratings_a = [5, 15, 20, 20, 45]", 1);
        assert_ne!(broken, DEFAULT_TABLES);
        let err = parse_tables(&broken).unwrap_err();
        assert!(err.to_string().contains("rating 20A listed twice"), "{}", err);
    }

    #[test]
    fn test_conductor_resistances() {
        let tables = default_tables();
        assert_eq!(tables.resistance_per_metre(ConductorMaterial::Copper, 2.5), Some(7.41));
        assert_eq!(tables.resistance_per_metre(ConductorMaterial::Copper, 1.5), Some(12.10));
        assert_eq!(tables.resistance_per_metre(ConductorMaterial::Copper, 3.0), None);
        assert_eq!(
            tables.resistance_per_metre(ConductorMaterial::Aluminium, 2.5),
            None,
            "aluminium is not catalogued below 16 mm²"
        );
    }

    #[test]
    fn test_twin_and_earth_cpc() {
        let tables = default_tables();
        assert_eq!(tables.twin_and_earth_cpc(2.5), Some(1.5));
        assert_eq!(tables.twin_and_earth_cpc(6.0), Some(2.5));
        assert_eq!(tables.twin_and_earth_cpc(25.0), None);
    }

    #[test]
    fn test_insulation_bands() {
        let tables = default_tables();
        let selv = tables.insulation(VoltageBand::SelvPelv);
        assert_eq!(selv.test_voltage_v, 250);
        assert_eq!(selv.minimum, Megaohms(0.5));
        let lv = tables.insulation(VoltageBand::LowVoltage);
        assert_eq!(lv.test_voltage_v, 500);
        assert_eq!(lv.minimum, Megaohms(1.0));
    }

    #[test]
    fn test_rcd_bands_skip_five_times_above_30ma() {
        let tables = default_tables();
        let thirty = tables.rcd_bands(false, 30);
        assert_eq!(thirty.len(), 3);
        assert_eq!(thirty[2].max_ms, Some(40));

        let hundred = tables.rcd_bands(false, 100);
        assert_eq!(hundred.len(), 2, "no 5×IΔn test above 30 mA");

        let selective = tables.rcd_bands(true, 100);
        assert_eq!(selective[1].min_ms, Some(130));
        assert_eq!(selective[1].max_ms, Some(500));
    }

    #[test]
    fn test_mismatched_columns_rejected() {
        let broken = DEFAULT_TABLES.replace(
            "max_ohms = [7.28, 4.37,",
            "max_ohms = [4.37,",
        );
        let err = parse_tables(&broken).unwrap_err();
        assert!(err.to_string().contains("12 keys but 11 values"), "{}", err);
    }

    #[test]
    fn test_unknown_curve_rejected() {
        let broken = DEFAULT_TABLES.replacen("curve = \"D\"", "curve = \"K\"", 1);
        let err = parse_tables(&broken).unwrap_err();
        assert!(err.to_string().contains("unknown curve 'K'"), "{}", err);
    }

    #[test]
    fn test_load_tables_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.toml");
        let amended = DEFAULT_TABLES.replace("edition = \"BS 7671:2018+A2:2022\"", "edition = \"Test amendment\"");
        std::fs::write(&path, amended).unwrap();

        let tables = load_tables(&path).unwrap();
        assert_eq!(tables.edition(), "Test amendment");
    }

    #[test]
    fn test_load_tables_missing_file() {
        let err = load_tables(Path::new("/nonexistent/tables.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read reference tables"));
    }
}
