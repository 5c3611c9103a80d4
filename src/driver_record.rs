//! Flattening of a parsed INF into one normalized driver record.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::ParserSettings;
use crate::device_class::ClassNameLookup;
use crate::inf_file::{InfFile, MULTI_VALUE_SEPARATOR, first_segment};
use crate::signing::SigningInfo;
use crate::string_table::resolve_string;

pub const VERSION_SECTION: &str = "Version";
pub const MANUFACTURER_SECTION: &str = "Manufacturer";

/// Normalized metadata of one driver package.
///
/// Every field has a defined fallback (empty string / `false`) when the
/// source data is absent; resolution itself never fails. The multi-valued
/// fields are deduplicated sets, rendered sorted for determinism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverRecord {
    pub name: String,
    pub manufacturer: String,
    pub provider: String,
    pub class_name: String,
    pub class_guid: String,
    pub date: String,
    pub version: String,
    pub catalog_file: String,
    pub is_signed: bool,
    pub digital_signer: String,
    pub digital_signer_version: String,
    pub supported_platforms: Vec<String>,
    pub supported_os: Vec<String>,
    pub pnp_ids: Vec<String>,
    pub folder_hash: String,
}

impl DriverRecord {
    /// Resolves one record from a parsed INF plus the external signing
    /// verdict and class-name lookup.
    ///
    /// Missing `[Version]` or `[Manufacturer]` sections leave the dependent
    /// fields at their defaults instead of failing.
    pub fn resolve(
        name: impl Into<String>,
        inf: &InfFile,
        signing: &SigningInfo,
        class_lookup: &dyn ClassNameLookup,
        settings: &ParserSettings,
    ) -> DriverRecord {
        let version = inf.section(VERSION_SECTION);
        let version_value =
            |key: &str| version.and_then(|s| s.get(key)).map(first_segment).unwrap_or("");

        let class_guid = version_value("ClassGuid").to_owned();

        let provider = version
            .and_then(|s| s.get("Provider"))
            .map(|v| resolve_string(inf, first_segment(v)))
            .unwrap_or_default();

        // The signer's reported catalog wins over whatever the INF claims.
        let catalog_file = if signing.is_signed {
            signing.catalog_file.clone()
        } else {
            version_value("CatalogFile").to_owned()
        };

        let (date, driver_version) = version
            .and_then(|s| s.get("DriverVer"))
            .map(split_driver_ver)
            .unwrap_or_default();

        let class_name = class_lookup
            .class_name(&class_guid)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| version_value("Class").to_owned());

        let mut record = DriverRecord {
            name: name.into(),
            provider,
            class_name,
            class_guid,
            date,
            version: driver_version,
            catalog_file,
            is_signed: signing.is_signed,
            digital_signer: signing.digital_signer.clone(),
            digital_signer_version: signing.digital_signer_version.clone(),
            ..Default::default()
        };

        resolve_devices(inf, settings, &mut record);
        record
    }
}

/// `DriverVer` is a `date,version` pair; the version part may carry a
/// trailing `;` annotation.
fn split_driver_ver(raw: &str) -> (String, String) {
    match raw.split_once(',') {
        Some((date, rest)) => (date.trim().to_owned(), first_segment(rest).to_owned()),
        None => (raw.trim().to_owned(), String::new()),
    }
}

/// Walks the manufacturer's decorated model sections, accumulating the
/// platform/OS matrix and (on request) the supported hardware IDs.
///
/// The first `[Manufacturer]` entry maps a display name to a comma list
/// whose head names the models section and doubles as the default
/// decoration; every element is probed as a `<models>.<decoration>` section.
fn resolve_devices(inf: &InfFile, settings: &ParserSettings, record: &mut DriverRecord) {
    let Some(manufacturers) = inf.section(MANUFACTURER_SECTION) else {
        return;
    };
    let Some((key, value)) = manufacturers.first_entry() else {
        return;
    };

    record.manufacturer = resolve_string(inf, key);

    let decorations: Vec<&str> = first_segment(value)
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    let Some(models_name) = decorations.first().copied() else {
        return;
    };

    let mut platforms = BTreeSet::new();
    let mut os_tags = BTreeSet::new();
    let mut pnp_ids = BTreeSet::new();

    for decoration in decorations {
        let Some(models) = inf.section(&format!("{models_name}.{decoration}")) else {
            continue;
        };

        let (architecture, os_tag) = split_decoration(decoration);
        platforms.insert(architecture.to_owned());
        if let Some(os_tag) = os_tag {
            os_tags.insert(os_tag.to_owned());
        }

        if settings.should_list_pnp_ids() {
            for value in models.values() {
                for entry in value.split(MULTI_VALUE_SEPARATOR) {
                    if let Some(id) = hardware_id(entry) {
                        pnp_ids.insert(id.to_owned());
                    }
                }
            }
        }
    }

    record.supported_platforms = platforms.into_iter().collect();
    record.supported_os = os_tags.into_iter().collect();
    record.pnp_ids = pnp_ids.into_iter().collect();
}

/// Splits a decoration like `NTamd64.10.0` into an architecture tag and the
/// OS suffix after the first dot. Unrecognized prefixes count as `x86`.
fn split_decoration(decoration: &str) -> (&'static str, Option<&str>) {
    let (prefix, os_tag) = match decoration.split_once('.') {
        Some((prefix, rest)) => (prefix, Some(rest)),
        None => (decoration, None),
    };

    let architecture = if ["NTamd64", "NTarm64", "NTia64"]
        .iter()
        .any(|a| prefix.eq_ignore_ascii_case(a))
    {
        "x64"
    } else {
        "x86"
    };

    (architecture, os_tag.map(str::trim).filter(|t| !t.is_empty()))
}

/// Device entries read `description,HardwareID[,CompatibleIDs...]`; the
/// hardware ID is the second comma field, after dropping any `;` annotation.
fn hardware_id(entry: &str) -> Option<&str> {
    let mut fields = entry.split(';').next().unwrap_or("").split(',');
    fields.next()?;
    let id = fields.next()?.trim();
    (!id.is_empty()).then_some(id)
}
