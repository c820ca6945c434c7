use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct XrefPaths {
    pub xref_home: PathBuf,
    pub uploads_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_file: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<XrefPaths> {
    let xref_home = match env::var("XREF_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("xref"),
    };

    let uploads_dir = env_or_default_path("XREF_UPLOADS_DIR", xref_home.join("uploads"));
    let outputs_dir = env_or_default_path("XREF_OUTPUTS_DIR", xref_home.join("outputs"));
    let data_dir = env_or_default_path("XREF_DATA_DIR", xref_home.join("data"));
    let cache_file = env_or_default_path("XREF_CACHE_FILE", data_dir.join("ORJ_NO.json"));
    let logs_dir = env_or_default_path("XREF_LOGS_DIR", xref_home.join("logs"));

    Ok(XrefPaths {
        xref_home,
        uploads_dir,
        outputs_dir,
        data_dir,
        cache_file,
        logs_dir,
    })
}

impl XrefPaths {
    /// Every path rooted under one directory.
    #[cfg(test)]
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let xref_home = root.into();
        let data_dir = xref_home.join("data");
        Self {
            uploads_dir: xref_home.join("uploads"),
            outputs_dir: xref_home.join("outputs"),
            cache_file: data_dir.join("ORJ_NO.json"),
            data_dir,
            logs_dir: xref_home.join("logs"),
            xref_home,
        }
    }
}
