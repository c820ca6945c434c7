use crate::error::XrefError;
use crate::xref::paths::XrefPaths;
use crate::xref::record::FieldMapping;
use crate::xref::source::SourceKind;
use crate::xref::source::remote::{DEFAULT_TIMEOUT_SECS, sheet_endpoint};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefSourcesConfig {
    pub order: Vec<String>,
}

impl Default for XrefSourcesConfig {
    fn default() -> Self {
        Self {
            order: vec!["remote".to_string(), "cache".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefRemoteConfig {
    pub api_url: String,
    pub sheet_id: String,
    pub sheet_name: String,
    pub timeout_secs: u64,
    pub oe_field: String,
    pub yv_field: String,
}

impl Default for XrefRemoteConfig {
    fn default() -> Self {
        let FieldMapping { oe_field, yv_field } = FieldMapping::orj_no();
        Self {
            api_url: String::new(),
            sheet_id: String::new(),
            sheet_name: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            oe_field,
            yv_field,
        }
    }
}

impl XrefRemoteConfig {
    pub fn endpoint(&self) -> String {
        sheet_endpoint(&self.api_url, &self.sheet_id, &self.sheet_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefCacheConfig {
    pub oe_field: String,
    pub yv_field: String,
}

impl Default for XrefCacheConfig {
    fn default() -> Self {
        let FieldMapping { oe_field, yv_field } = FieldMapping::oe_yv();
        Self { oe_field, yv_field }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefLocalSheetConfig {
    pub path: String,
    pub sheet_names: Vec<String>,
    pub oe_field: String,
    pub yv_field: String,
}

impl Default for XrefLocalSheetConfig {
    fn default() -> Self {
        let FieldMapping { oe_field, yv_field } = FieldMapping::orj_no();
        Self {
            path: String::new(),
            sheet_names: vec!["Sheet1".to_string(), "Sayfa1".to_string()],
            oe_field,
            yv_field,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefUpdateConfig {
    pub sheet_names: Vec<String>,
    pub oe_field: String,
    pub yv_field: String,
}

impl Default for XrefUpdateConfig {
    fn default() -> Self {
        let FieldMapping { oe_field, yv_field } = FieldMapping::orj_no();
        Self {
            sheet_names: vec!["Sheet1".to_string()],
            oe_field,
            yv_field,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefMatcherConfig {
    pub sheet_names: Vec<String>,
}

impl Default for XrefMatcherConfig {
    fn default() -> Self {
        Self {
            sheet_names: vec!["Sayfa1".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefRetentionConfig {
    pub outputs_keep: usize,
    pub uploads_keep: usize,
}

impl Default for XrefRetentionConfig {
    fn default() -> Self {
        Self {
            outputs_keep: 5,
            uploads_keep: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct XrefConfig {
    pub sources: XrefSourcesConfig,
    pub remote: XrefRemoteConfig,
    pub cache: XrefCacheConfig,
    pub local_sheet: XrefLocalSheetConfig,
    pub update: XrefUpdateConfig,
    pub matcher: XrefMatcherConfig,
    pub retention: XrefRetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialXrefConfig {
    sources: Option<XrefSourcesConfig>,
    remote: Option<XrefRemoteConfig>,
    cache: Option<XrefCacheConfig>,
    local_sheet: Option<XrefLocalSheetConfig>,
    update: Option<XrefUpdateConfig>,
    matcher: Option<XrefMatcherConfig>,
    retention: Option<XrefRetentionConfig>,
}

impl XrefConfig {
    pub fn source_order(&self) -> Result<Vec<SourceKind>> {
        self.sources
            .order
            .iter()
            .map(|name| name.parse::<SourceKind>().map_err(|err| anyhow!(err)))
            .collect()
    }

    pub fn remote_mapping(&self) -> FieldMapping {
        FieldMapping::new(&self.remote.oe_field, &self.remote.yv_field)
    }

    pub fn cache_mapping(&self) -> FieldMapping {
        FieldMapping::new(&self.cache.oe_field, &self.cache.yv_field)
    }

    pub fn local_sheet_mapping(&self) -> FieldMapping {
        FieldMapping::new(&self.local_sheet.oe_field, &self.local_sheet.yv_field)
    }

    pub fn update_mapping(&self) -> FieldMapping {
        FieldMapping::new(&self.update.oe_field, &self.update.yv_field)
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_string_first(vars: &[&str], fallback: &str) -> String {
    for var in vars {
        if let Ok(v) = env::var(var) {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    fallback.to_string()
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        Err(_) => fallback.to_vec(),
    }
}

fn validate_mapping(label: &str, oe: &str, yv: &str) -> Result<()> {
    if oe.trim().is_empty() || yv.trim().is_empty() {
        return Err(anyhow!("invalid {label} field mapping: field names cannot be empty"));
    }
    Ok(())
}

fn validate(cfg: &XrefConfig) -> Result<()> {
    if cfg.sources.order.is_empty() {
        return Err(anyhow!("invalid source order: at least one source is required"));
    }
    let order = cfg.source_order()?;
    let mut seen = HashSet::new();
    for kind in &order {
        if !seen.insert(*kind) {
            return Err(anyhow!("invalid source order: `{kind}` listed twice"));
        }
    }
    if cfg.remote.timeout_secs == 0 {
        return Err(anyhow!("invalid remote timeout: must be >= 1 second"));
    }
    validate_mapping("remote", &cfg.remote.oe_field, &cfg.remote.yv_field)?;
    validate_mapping("cache", &cfg.cache.oe_field, &cfg.cache.yv_field)?;
    validate_mapping(
        "local sheet",
        &cfg.local_sheet.oe_field,
        &cfg.local_sheet.yv_field,
    )?;
    validate_mapping("update", &cfg.update.oe_field, &cfg.update.yv_field)?;
    Ok(())
}

fn resolve_config_path(paths: &XrefPaths) -> PathBuf {
    if let Ok(custom) = env::var("XREF_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    paths.xref_home.join("xref.toml")
}

fn merge_file_config(base: &mut XrefConfig, paths: &XrefPaths) -> Result<()> {
    let path = resolve_config_path(paths);
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialXrefConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse xref config {}: {err}", path.display()))?;
    if let Some(sources) = parsed.sources {
        base.sources = sources;
    }
    if let Some(remote) = parsed.remote {
        base.remote = remote;
    }
    if let Some(cache) = parsed.cache {
        base.cache = cache;
    }
    if let Some(local_sheet) = parsed.local_sheet {
        base.local_sheet = local_sheet;
    }
    if let Some(update) = parsed.update {
        base.update = update;
    }
    if let Some(matcher) = parsed.matcher {
        base.matcher = matcher;
    }
    if let Some(retention) = parsed.retention {
        base.retention = retention;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut XrefConfig) {
    cfg.sources.order = env_or_csv("XREF_SOURCE_ORDER", &cfg.sources.order);
    cfg.remote.api_url = env_or_string_first(
        &["XREF_REMOTE_URL", "GOOGLE_SHEETS_API_URL"],
        &cfg.remote.api_url,
    );
    cfg.remote.sheet_id = env_or_string_first(
        &["XREF_REMOTE_SHEET_ID", "GOOGLE_SHEETS_ID"],
        &cfg.remote.sheet_id,
    );
    cfg.remote.sheet_name = env_or_string_first(
        &["XREF_REMOTE_SHEET_NAME", "GOOGLE_SHEETS_SHEET_NAME"],
        &cfg.remote.sheet_name,
    );
    cfg.remote.timeout_secs = env_or_u64("XREF_REMOTE_TIMEOUT_SECS", cfg.remote.timeout_secs);
    cfg.local_sheet.path = env_or_string("XREF_LOCAL_SHEET_PATH", &cfg.local_sheet.path);
    cfg.update.oe_field = env_or_string("XREF_UPDATE_OE_FIELD", &cfg.update.oe_field);
    cfg.update.yv_field = env_or_string("XREF_UPDATE_YV_FIELD", &cfg.update.yv_field);
    cfg.retention.outputs_keep = env_or_usize("XREF_OUTPUTS_KEEP", cfg.retention.outputs_keep);
    cfg.retention.uploads_keep = env_or_usize("XREF_UPLOADS_KEEP", cfg.retention.uploads_keep);
}

/// Defaults, then the TOML file, then environment overrides; validated.
pub fn load_config(paths: &XrefPaths) -> Result<XrefConfig> {
    let mut cfg = XrefConfig::default();
    merge_file_config(&mut cfg, paths)
        .and_then(|()| {
            apply_env_overrides(&mut cfg);
            validate(&cfg)
        })
        .map_err(|err| XrefError::InvalidConfig(format!("{err:#}")))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_remote() -> XrefConfig {
        let mut cfg = XrefConfig::default();
        cfg.remote.api_url = "https://sheets.example.com/api".to_string();
        cfg
    }

    #[test]
    fn defaults_are_remote_first_with_documented_mappings() {
        let cfg = with_remote();
        validate(&cfg).expect("valid");
        assert_eq!(
            cfg.source_order().expect("order"),
            vec![SourceKind::Remote, SourceKind::Cache]
        );
        assert_eq!(cfg.remote_mapping(), FieldMapping::orj_no());
        assert_eq!(cfg.cache_mapping(), FieldMapping::oe_yv());
        assert_eq!(cfg.retention.outputs_keep, 5);
        assert_eq!(cfg.retention.uploads_keep, 3);
    }

    #[test]
    fn remote_without_url_still_validates() {
        // An unconfigured remote fails at load time and falls back.
        validate(&XrefConfig::default()).expect("valid");
    }

    #[test]
    fn zero_timeout_and_blank_fields_are_rejected() {
        let mut cfg = with_remote();
        cfg.remote.timeout_secs = 0;
        assert!(validate(&cfg).expect_err("timeout").to_string().contains("timeout"));

        let mut cfg = with_remote();
        cfg.cache.yv_field = " ".to_string();
        assert!(validate(&cfg).expect_err("mapping").to_string().contains("cache"));
    }

    #[test]
    fn duplicate_unknown_or_empty_order_is_rejected() {
        let mut cfg = with_remote();
        cfg.sources.order = vec!["cache".to_string(), "json".to_string()];
        assert!(validate(&cfg).expect_err("dup").to_string().contains("twice"));

        cfg.sources.order = vec!["ftp".to_string()];
        assert!(validate(&cfg).expect_err("unknown").to_string().contains("unknown source"));

        cfg.sources.order.clear();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn partial_toml_sections_keep_section_defaults() {
        let parsed: PartialXrefConfig = toml::from_str(
            r#"
[sources]
order = ["cache", "remote"]

[cache]
oe_field = "orjNo"
yv_field = "yvNo"

[retention]
outputs_keep = 10
"#,
        )
        .expect("parse");
        assert_eq!(
            parsed.sources.expect("sources").order,
            vec!["cache".to_string(), "remote".to_string()]
        );
        assert_eq!(parsed.cache.expect("cache").oe_field, "orjNo");
        let retention = parsed.retention.expect("retention");
        assert_eq!(retention.outputs_keep, 10);
        assert_eq!(retention.uploads_keep, 3);
        assert!(parsed.remote.is_none());
    }

    #[test]
    fn endpoint_is_built_from_remote_section() {
        let mut cfg = with_remote();
        cfg.remote.sheet_id = "sheet-123".to_string();
        cfg.remote.sheet_name = "Sayfa1".to_string();
        assert_eq!(
            cfg.remote.endpoint(),
            "https://sheets.example.com/api/sheet-123/Sayfa1"
        );
    }
}
