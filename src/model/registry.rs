use crate::error::{Error, Result};
use crate::model::checksum::ExpectedDigest;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const BUILTIN_BASE_URL: &str = "https://huggingface.co/lili666/imgocr/resolve/main";

/// Named subset of the catalog selected for a provisioning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningMode {
    /// Small, fast models only.
    #[default]
    Efficiency,
    /// The entire catalog.
    #[serde(alias = "all")]
    Full,
}

impl ProvisioningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningMode::Efficiency => "efficiency",
            ProvisioningMode::Full => "full",
        }
    }
}

impl fmt::Display for ProvisioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisioningMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "efficiency" => Ok(ProvisioningMode::Efficiency),
            "full" | "all" => Ok(ProvisioningMode::Full),
            other => Err(Error::InvalidInput(format!(
                "Unknown mode: {} (expected \"efficiency\" or \"full\")",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetDescriptor {
    pub id: String,
    pub source_uri: String,
    pub expected_digest: Option<ExpectedDigest>,
    pub approximate_size_mb: f64,
    pub modes: BTreeSet<ProvisioningMode>,
}

impl AssetDescriptor {
    pub fn new(id: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_uri: source_uri.into(),
            expected_digest: None,
            approximate_size_mb: 0.0,
            modes: BTreeSet::from([ProvisioningMode::Full]),
        }
    }

    pub fn with_digest(mut self, digest: ExpectedDigest) -> Self {
        self.expected_digest = Some(digest);
        self
    }

    pub fn with_size_mb(mut self, size_mb: f64) -> Self {
        self.approximate_size_mb = size_mb;
        self
    }

    pub fn with_mode(mut self, mode: ProvisioningMode) -> Self {
        self.modes.insert(mode);
        self
    }

    /// Every asset belongs to the full set, whatever its declared modes.
    pub fn belongs_to(&self, mode: ProvisioningMode) -> bool {
        mode == ProvisioningMode::Full || self.modes.contains(&mode)
    }

    /// Local file name; the id is the file name.
    pub fn file_name(&self) -> &str {
        &self.id
    }

    pub fn local_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// On-disk form of a catalog entry.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    source_uri: String,
    #[serde(default)]
    expected_digest: Option<String>,
    #[serde(default)]
    approximate_size_mb: f64,
    #[serde(default)]
    modes: Vec<ProvisioningMode>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    assets: Vec<CatalogEntry>,
}

impl TryFrom<CatalogEntry> for AssetDescriptor {
    type Error = Error;

    fn try_from(entry: CatalogEntry) -> Result<Self> {
        let mut asset = AssetDescriptor::new(entry.id, entry.source_uri)
            .with_size_mb(entry.approximate_size_mb);
        if let Some(digest) = entry.expected_digest {
            let digest = digest.parse().map_err(|e| {
                Error::Catalog(format!("asset {}: {}", asset.id, e))
            })?;
            asset = asset.with_digest(digest);
        }
        for mode in entry.modes {
            asset = asset.with_mode(mode);
        }
        Ok(asset)
    }
}

/// Immutable, ordered catalog of assets.
///
/// Catalog order is the processing order and the order of reported outcomes.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    assets: Vec<AssetDescriptor>,
    index: HashMap<String, usize>,
}

impl AssetRegistry {
    pub fn from_assets(assets: Vec<AssetDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(assets.len());
        for (pos, asset) in assets.iter().enumerate() {
            validate_id(&asset.id)?;
            if asset.source_uri.trim().is_empty() {
                return Err(Error::Catalog(format!("asset {} has no source", asset.id)));
            }
            if index.insert(asset.id.clone(), pos).is_some() {
                return Err(Error::Catalog(format!("duplicate asset id: {}", asset.id)));
            }
        }
        // The default mode must never select an empty set.
        if !assets.iter().any(|a| a.belongs_to(ProvisioningMode::Efficiency)) {
            return Err(Error::Catalog(
                "no asset belongs to the efficiency set".to_string(),
            ));
        }
        Ok(Self { assets, index })
    }

    /// The OCR model set shipped with the engine.
    pub fn builtin() -> Self {
        let mobile = [
            ("ch_PP-OCRv4_det_mobile_infer.onnx", 2.5),
            ("ch_PP-OCRv4_rec_mobile_infer.onnx", 11.5),
            ("ch_PP-OCRv4_cls_infer.onnx", 1.5),
        ];
        let server = [
            ("ch_PP-OCRv4_det_server_infer.onnx", 108.1),
            ("ch_PP-OCRv4_rec_server_infer.onnx", 86.3),
        ];

        let assets = mobile
            .iter()
            .map(|(id, size)| {
                builtin_asset(id, *size).with_mode(ProvisioningMode::Efficiency)
            })
            .chain(server.iter().map(|(id, size)| builtin_asset(id, *size)))
            .collect::<Vec<_>>();

        let index = assets
            .iter()
            .enumerate()
            .map(|(pos, asset)| (asset.id.clone(), pos))
            .collect();
        Self { assets, index }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let assets = file
            .assets
            .into_iter()
            .map(AssetDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::from_assets(assets)
    }

    pub fn all_assets(&self) -> &[AssetDescriptor] {
        &self.assets
    }

    pub fn assets_for_mode(&self, mode: ProvisioningMode) -> Vec<&AssetDescriptor> {
        self.assets.iter().filter(|a| a.belongs_to(mode)).collect()
    }

    pub fn get(&self, id: &str) -> Option<&AssetDescriptor> {
        self.index.get(id).map(|&pos| &self.assets[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

fn builtin_asset(id: &str, size_mb: f64) -> AssetDescriptor {
    AssetDescriptor::new(id, format!("{}/{}", BUILTIN_BASE_URL, id)).with_size_mb(size_mb)
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Catalog("asset id cannot be empty".to_string()));
    }
    if id == "." || id == ".." || id.contains(['/', '\\']) || id.ends_with(".part") {
        return Err(Error::Catalog(format!(
            "asset id is not a plain file name: {}",
            id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efficiency_is_strict_subset_in_catalog_order() {
        let registry = AssetRegistry::builtin();
        let all: Vec<&str> = registry.all_assets().iter().map(|a| a.id.as_str()).collect();
        let efficiency: Vec<&str> = registry
            .assets_for_mode(ProvisioningMode::Efficiency)
            .iter()
            .map(|a| a.id.as_str())
            .collect();

        assert!(!efficiency.is_empty());
        assert!(efficiency.len() < all.len());

        // Subsequence of the catalog, so order is preserved.
        let mut rest = all.iter();
        for id in &efficiency {
            assert!(rest.any(|a| a == id), "{} out of order", id);
        }
    }

    #[test]
    fn full_returns_everything_without_duplicates() {
        let registry = AssetRegistry::builtin();
        let full: Vec<&str> = registry
            .assets_for_mode(ProvisioningMode::Full)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        let all: Vec<&str> = registry.all_assets().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(full, all);

        let unique: BTreeSet<&str> = full.iter().copied().collect();
        assert_eq!(unique.len(), full.len());
    }

    #[test]
    fn lookup_by_id() {
        let registry = AssetRegistry::builtin();
        assert!(registry.contains("ch_PP-OCRv4_cls_infer.onnx"));
        assert!(!registry.contains("missing.onnx"));
        let asset = registry.get("ch_PP-OCRv4_det_server_infer.onnx").unwrap();
        assert!(asset.source_uri.ends_with("/ch_PP-OCRv4_det_server_infer.onnx"));
        assert!(!asset.belongs_to(ProvisioningMode::Efficiency));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let assets = vec![
            AssetDescriptor::new("a.onnx", "http://x/a").with_mode(ProvisioningMode::Efficiency),
            AssetDescriptor::new("a.onnx", "http://x/b"),
        ];
        let err = AssetRegistry::from_assets(assets).unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[test]
    fn path_like_ids_are_rejected() {
        for id in ["", "..", "nested/a.onnx", "a.onnx.part"] {
            let assets =
                vec![AssetDescriptor::new(id, "http://x/a").with_mode(ProvisioningMode::Efficiency)];
            assert!(AssetRegistry::from_assets(assets).is_err(), "{:?} accepted", id);
        }
    }

    #[test]
    fn mode_parsing_accepts_all_alias() {
        assert_eq!("full".parse::<ProvisioningMode>().unwrap(), ProvisioningMode::Full);
        assert_eq!("ALL".parse::<ProvisioningMode>().unwrap(), ProvisioningMode::Full);
        assert_eq!(
            "efficiency".parse::<ProvisioningMode>().unwrap(),
            ProvisioningMode::Efficiency
        );
        assert!("fast".parse::<ProvisioningMode>().is_err());
    }

    #[test]
    fn catalog_from_toml() {
        let registry = AssetRegistry::from_toml(
            r#"
            [[assets]]
            id = "det.onnx"
            source_uri = "https://example.com/det.onnx"
            expected_digest = "B1946AC92492D2347C6235B4D2611184"
            approximate_size_mb = 2.5
            modes = ["efficiency"]

            [[assets]]
            id = "rec.onnx"
            source_uri = "https://example.com/rec.onnx"
            "#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        let det = registry.get("det.onnx").unwrap();
        assert!(det.belongs_to(ProvisioningMode::Efficiency));
        assert!(det.belongs_to(ProvisioningMode::Full));
        assert_eq!(
            det.expected_digest.as_ref().unwrap().hex(),
            "b1946ac92492d2347c6235b4d2611184"
        );
        let rec = registry.get("rec.onnx").unwrap();
        assert!(rec.expected_digest.is_none());
        assert_eq!(registry.assets_for_mode(ProvisioningMode::Efficiency).len(), 1);
    }

    #[test]
    fn catalog_with_bad_digest_is_rejected() {
        let err = AssetRegistry::from_toml(
            r#"
            [[assets]]
            id = "det.onnx"
            source_uri = "https://example.com/det.onnx"
            expected_digest = "not-a-digest"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[test]
    fn catalog_without_efficiency_assets_is_rejected() {
        let err = AssetRegistry::from_toml(
            r#"
            [[assets]]
            id = "det.onnx"
            source_uri = "https://example.com/det.onnx"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));

        let err = AssetRegistry::from_toml("").unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }
}
