use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of work produced by implementing an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkType {
    #[default]
    Demo,
    CaseStudy,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::CaseStudy => "case-study",
        }
    }
}

impl std::fmt::Display for WorkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "demo" => Ok(Self::Demo),
            "case-study" => Ok(Self::CaseStudy),
            _ => Err(format!("Invalid work type: {} (expected demo or case-study)", s)),
        }
    }
}

/// How the site embeds a work's live demo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoDescriptor {
    pub kind: String,
    pub src: String,
    pub dev_src: String,
    pub height: u32,
}

impl DemoDescriptor {
    pub const DEV_SRC: &'static str = "http://localhost:5173/";
    pub const HEIGHT: u32 = 720;

    /// Iframe descriptor for the demo built under `demos/{author}/{slug}/`.
    pub fn iframe(author_id: &str, slug: &str) -> Self {
        Self {
            kind: "iframe".to_string(),
            src: format!("/demos/{author_id}/{slug}/index.html"),
            dev_src: Self::DEV_SRC.to_string(),
            height: Self::HEIGHT,
        }
    }
}

/// Front matter of a work's `meta.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkMeta {
    pub title: String,
    pub summary: String,
    #[serde(rename = "type")]
    pub work_type: WorkType,
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_idea_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub demo: DemoDescriptor,
}
