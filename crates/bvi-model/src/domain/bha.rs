use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};

use crate::{ModelError, TaskId};

/// Detection family chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Fast,
    Intelligent,
}

/// Similarity algorithm run by the analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sfs,
    Ssfs,
    Bsd,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sfs => "sfs",
            Algorithm::Ssfs => "ssfs",
            Algorithm::Bsd => "bsd",
        }
    }

    /// Algorithms of the intelligent family need a trained model.
    pub fn requires_model(&self) -> bool {
        matches!(self, Algorithm::Ssfs | Algorithm::Bsd)
    }

    /// Number of matches the service should return per function.
    pub fn top_n(&self) -> u32 {
        match self {
            Algorithm::Sfs => 1,
            _ => 100,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sfs" => Ok(Algorithm::Sfs),
            "ssfs" => Ok(Algorithm::Ssfs),
            "bsd" => Ok(Algorithm::Bsd),
            other => Err(ModelError::UnknownAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BhaParams {
    pub detection_method: DetectionMethod,
    pub algorithm: Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

/// A trained model uploaded for the intelligent detection family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BhaModel {
    pub id: String,
    pub name: String,
    pub algorithm: Algorithm,
    /// Blob-store path of the model file.
    pub path: String,
    #[serde(default)]
    pub is_builtin: bool,
    /// Soft-delete marker; the reaper purges the model once no active job references it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<SystemTime>,
}

// Result file written by the analysis service.

/// One analysed binary.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScanFile {
    pub file_id: String,
    pub file_path: String,
    #[serde(default)]
    pub file_arch: String,
    #[serde(default)]
    pub funcs: Vec<ScanFunc>,
}

/// One function of an analysed binary.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScanFunc {
    pub addr: String,
    pub fname: String,
    #[serde(default)]
    pub results: Vec<ScanMatch>,
}

/// A known function similar to the analysed one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScanMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub refs: Option<Vec<String>>,
    pub fname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optlevel: Option<String>,
    pub sim: f64,
}

// Persisted records derived from the result file.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BhaFunc {
    pub task_id: TaskId,
    pub file_id: String,
    pub file_arch: String,
    pub file_path: String,
    pub addr: String,
    pub fname: String,
}

impl BhaFunc {
    pub fn from_scan(task_id: &str, file: &ScanFile, func: &ScanFunc) -> Self {
        Self {
            task_id: task_id.to_string(),
            file_id: file.file_id.clone(),
            file_arch: file.file_arch.clone(),
            file_path: file.file_path.clone(),
            addr: func.addr.clone(),
            fname: func.fname.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BhaFuncResult {
    pub task_id: TaskId,
    pub func_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub refs: Vec<String>,
    pub fname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_level: Option<String>,
    pub sim: f64,
}

impl BhaFuncResult {
    pub fn from_match(task_id: &str, func_id: &str, m: &ScanMatch) -> Self {
        Self {
            task_id: task_id.to_string(),
            func_id: func_id.to_string(),
            purl: m.purl.clone(),
            version: m.version.clone(),
            refs: m.refs.clone().unwrap_or_default(),
            fname: m.fname.clone(),
            cve: m.cve.clone(),
            arch: m.arch.clone(),
            opt_level: m.optlevel.clone(),
            sim: m.sim,
        }
    }
}
