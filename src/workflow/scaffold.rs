//! Repository layout and generated file contents for works and their demos.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ideaworks_common::{CommitPlan, FileChange, WorkMeta};
use serde::Serialize;

use crate::errors::HostingError;

pub fn work_dir(author_id: &str, slug: &str) -> String {
    format!("content/works/{author_id}/{slug}")
}

pub fn work_meta_path(author_id: &str, slug: &str) -> String {
    format!("{}/meta.yml", work_dir(author_id, slug))
}

pub fn work_body_path(author_id: &str, slug: &str) -> String {
    format!("{}/index.mdx", work_dir(author_id, slug))
}

pub fn demo_dir(author_id: &str, slug: &str) -> String {
    format!("demos/{author_id}/{slug}")
}

pub fn demo_package_path(author_id: &str, slug: &str) -> String {
    format!("{}/package.json", demo_dir(author_id, slug))
}

/// `YYYY-MM-DD` in UTC.
pub fn iso_date(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

fn render_error(step: &'static str, err: impl std::fmt::Display) -> HostingError {
    HostingError::Encode {
        step,
        message: err.to_string(),
    }
}

pub fn render_work_meta(meta: &WorkMeta) -> Result<String, HostingError> {
    serde_yaml::to_string(meta).map_err(|e| render_error("render work meta", e))
}

/// Body of the draft work created when an idea is claimed.
pub fn claim_body(title: &str, idea_id: &str, summary: &str) -> String {
    format!(
        "# {title}\n\
         \n\
         Source idea: {idea_id}\n\
         \n\
         ## Goal\n\
         \n\
         {summary}\n\
         \n\
         ## Implementation log\n\
         \n\
         - \n"
    )
}

/// Body of the work created when an idea is completed. The original idea body
/// is embedded at the end.
pub fn completion_body(title: &str, idea_id: &str, idea_body: &str) -> String {
    format!(
        "# {title}\n\
         \n\
         Source idea: [/works/{idea_id}](/works/{idea_id})\n\
         \n\
         ## Implementation notes\n\
         \n\
         - Describe how this was built and how to use it.\n\
         \n\
         ---\n\
         \n\
         ## Original idea\n\
         \n\
         {}\n",
        idea_body.trim()
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoPackage {
    name: String,
    private: bool,
    version: &'static str,
    #[serde(rename = "type")]
    module_type: &'static str,
    scripts: DemoScripts,
    dependencies: BTreeMap<&'static str, &'static str>,
    dev_dependencies: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize)]
struct DemoScripts {
    dev: &'static str,
    build: &'static str,
    preview: &'static str,
}

fn demo_package_json(author_id: &str, slug: &str) -> Result<String, HostingError> {
    let package = DemoPackage {
        name: format!("@demo/{author_id}-{slug}"),
        private: true,
        version: "0.0.0",
        module_type: "module",
        scripts: DemoScripts {
            dev: "vite --port 5173 --strictPort",
            build: "vite build",
            preview: "vite preview --port 4173",
        },
        dependencies: BTreeMap::from([("react", "^19.2.0"), ("react-dom", "^19.2.0")]),
        dev_dependencies: BTreeMap::from([("vite", "^5.4.21")]),
    };
    let mut json = serde_json::to_string_pretty(&package)
        .map_err(|e| render_error("render demo package.json", e))?;
    json.push('\n');
    Ok(json)
}

const VITE_CONFIG: &str = "import { defineConfig } from 'vite'

export default defineConfig({
  base: './',
})
";

const MAIN_JSX: &str = r#"import React from 'react'
import { createRoot } from 'react-dom/client'
import App from './App.jsx'

function postResize() {
  const height = Math.max(
    document.documentElement.scrollHeight,
    document.body?.scrollHeight ?? 0,
    document.documentElement.offsetHeight,
    document.body?.offsetHeight ?? 0,
  )
  let targetOrigin = '*'
  try {
    if (document.referrer) targetOrigin = new URL(document.referrer).origin
  } catch {}
  window.parent?.postMessage({ type: 'demo:resize', height }, targetOrigin)
}

const root = createRoot(document.getElementById('root'))
root.render(<App onChange={() => postResize()} />)

window.addEventListener('load', postResize)
window.addEventListener('resize', postResize)
"#;

const APP_JSX: &str = r#"import React, { useEffect, useState } from 'react'

export default function App({ onChange }) {
  const [count, setCount] = useState(0)
  useEffect(() => {
    if (typeof onChange === 'function') onChange()
  }, [count, onChange])
  return (
    <div style={{ padding: 16, fontFamily: 'ui-sans-serif, system-ui' }}>
      <h1 style={{ margin: 0, fontSize: 18 }}>WIP Demo</h1>
      <button type="button" onClick={() => setCount((v) => v + 1)}>+1</button>
      <span style={{ marginLeft: 12 }}>{count}</span>
    </div>
  )
}
"#;

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn demo_index_html(title: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{}</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
  </body>
</html>
"#,
        escape_html(title)
    )
}

/// Runnable Vite + React starter under `demos/{author}/{slug}/`.
pub fn demo_scaffold(
    author_id: &str,
    slug: &str,
    title: &str,
) -> Result<Vec<FileChange>, HostingError> {
    let dir = demo_dir(author_id, slug);
    Ok(vec![
        FileChange::text(
            format!("{dir}/package.json"),
            demo_package_json(author_id, slug)?,
        ),
        FileChange::text(format!("{dir}/vite.config.js"), VITE_CONFIG),
        FileChange::text(format!("{dir}/index.html"), demo_index_html(title)),
        FileChange::text(format!("{dir}/src/main.jsx"), MAIN_JSX),
        FileChange::text(format!("{dir}/src/App.jsx"), APP_JSX),
    ])
}

/// Work meta, work body and demo scaffold for one work, in that order.
pub fn work_plan(
    author_id: &str,
    slug: &str,
    meta: &WorkMeta,
    body: String,
) -> Result<CommitPlan, HostingError> {
    let mut plan = CommitPlan::new();
    plan.push(FileChange::text(
        work_meta_path(author_id, slug),
        render_work_meta(meta)?,
    ));
    plan.push(FileChange::text(work_body_path(author_id, slug), body));
    plan.extend(demo_scaffold(author_id, slug, &meta.title)?);
    Ok(plan)
}
