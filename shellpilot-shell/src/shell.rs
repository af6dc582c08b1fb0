//! # Command Shell
//!
//! Stateful interpreter behind the tool catalog. One `CommandShell` owns the
//! current working directory and executes structured command calls against
//! the filesystem, subprocesses, and the network.
//!
//! Two entry points:
//! - `dispatch(name, args)` takes an already-typed argument map, exactly as
//!   decoded from a model tool call
//! - `run_line(line)` is the human-facing surface: whitespace tokens, `--flag`
//!   switches, and an escape hatch that runs unknown commands as subprocesses

use crate::catalog::ToolCatalog;
use serde_json::{Map, Value};
use shellpilot_error::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;

/// Wall-clock limit for `exec` subprocesses.
const EXEC_TIMEOUT_SECS: u64 = 30;

/// Combined stdout+stderr cap for `exec`.
const EXEC_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Maximum body bytes `fetch` returns inline (without a `dest`).
const FETCH_INLINE_LIMIT: usize = 1024;

/// Stateful command interpreter.
///
/// The catalog lives inside the shell so the advertised tool definitions and
/// the dispatch table can never drift apart silently; `verify_catalog` makes
/// the check explicit at startup.
pub struct CommandShell {
    cwd: PathBuf,
    catalog: ToolCatalog,
    http: reqwest::Client,
    exec_timeout: std::time::Duration,
    exec_output_cap: usize,
}

impl CommandShell {
    /// Every command `dispatch` implements, in catalog order.
    pub const COMMANDS: &'static [&'static str] = &[
        "help", "pwd", "cd", "ls", "tree", "mkdir", "touch", "write", "read", "rm", "cp", "mv",
        "fetch", "exec", "chrome",
    ];

    /// Create a shell rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::from(e).with_operation("shell::new"))?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a shell rooted at an explicit directory.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            catalog: ToolCatalog::new(),
            http: reqwest::Client::new(),
            exec_timeout: std::time::Duration::from_secs(EXEC_TIMEOUT_SECS),
            exec_output_cap: EXEC_MAX_OUTPUT_BYTES,
        }
    }

    /// Override the `exec` wall-clock limit
    pub fn with_exec_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    /// Override the `exec` combined-output cap
    pub fn with_exec_output_cap(mut self, bytes: usize) -> Self {
        self.exec_output_cap = bytes;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Check that the catalog declares exactly the commands `dispatch`
    /// implements. Run once at startup.
    pub fn verify_catalog(&self) -> Result<()> {
        let declared = self.catalog.names();
        if declared != Self::COMMANDS {
            return Err(Error::protocol_invalid(format!(
                "catalog declares [{}] but the shell implements [{}]",
                declared.join(" "),
                Self::COMMANDS.join(" ")
            ))
            .with_operation("shell::verify_catalog"));
        }
        Ok(())
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Execute one structured command call.
    ///
    /// Arguments are validated against the catalog schema first; an unknown
    /// command name or a malformed argument map is `ProtocolInvalid`.
    pub async fn dispatch(&mut self, name: &str, args: &Map<String, Value>) -> Result<String> {
        self.catalog.validate(name, args)?;

        match name {
            "help" => Ok(self.catalog.help_text()),
            "pwd" => Ok(self.cwd.display().to_string()),
            "cd" => self.cmd_cd(&require_str(args, "path")?),
            "ls" => self.cmd_ls(opt_str(args, "path").as_deref()),
            "tree" => self.cmd_tree(opt_str(args, "path").as_deref()),
            "mkdir" => self.cmd_mkdir(&require_str(args, "path")?),
            "touch" => self.cmd_touch(&require_str(args, "file")?),
            "write" => self.cmd_write(&require_str(args, "file")?, &require_str(args, "text")?),
            "read" => self.cmd_read(&require_str(args, "file")?),
            "rm" => self.cmd_rm(
                &require_str(args, "path")?,
                flag(args, "recursive"),
                flag(args, "force"),
            ),
            "cp" => self.cmd_cp(
                &require_str(args, "src")?,
                &require_str(args, "dest")?,
                flag(args, "recursive"),
            ),
            "mv" => self.cmd_mv(&require_str(args, "src")?, &require_str(args, "dest")?),
            "fetch" => {
                self.cmd_fetch(&require_str(args, "url")?, opt_str(args, "dest").as_deref())
                    .await
            }
            "exec" => self.cmd_exec(&require_str(args, "command")?).await,
            "chrome" => self.cmd_chrome(opt_str(args, "url").as_deref()),
            _ => Err(Error::protocol_invalid(format!("unknown command '{}'", name))
                .with_operation("shell::dispatch")),
        }
    }

    /// Execute one human-typed command line.
    ///
    /// Empty lines are a no-op. A first token that is not a catalog command
    /// runs the whole line as a subprocess, like the direct-command escape
    /// hatch of a normal shell.
    pub async fn run_line(&mut self, line: &str) -> Result<String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(String::new());
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let name = tokens[0];

        if self.catalog.contains(name) {
            let args = self.catalog.args_from_tokens(name, &tokens[1..])?;
            self.dispatch(name, &args).await
        } else {
            self.cmd_exec(line).await
        }
    }

    // ========================================================================
    // Command implementations
    // ========================================================================

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.cwd.join(p)
        }
    }

    fn cmd_cd(&mut self, path: &str) -> Result<String> {
        let target = self.resolve(path);
        if !target.exists() {
            return Err(Error::not_found(path).with_operation("shell::cd"));
        }
        if !target.is_dir() {
            return Err(
                Error::new(ErrorKind::UsageInvalid, format!("'{}' is not a directory", path))
                    .with_operation("shell::cd"),
            );
        }
        // Canonicalize so `cd ..` keeps the stored path tidy.
        self.cwd = target
            .canonicalize()
            .map_err(|e| Error::from(e).with_operation("shell::cd"))?;
        Ok(format!("Current directory: {}", self.cwd.display()))
    }

    fn cmd_ls(&self, path: Option<&str>) -> Result<String> {
        let dir = path.map(|p| self.resolve(p)).unwrap_or_else(|| self.cwd.clone());
        let mut entries = read_dir_sorted(&dir)
            .map_err(|e| e.with_operation("shell::ls").with_context("path", dir.display().to_string()))?;

        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            let name = entry.file_name().to_string_lossy().into_owned();
            let tag = if entry.path().is_dir() { "[D] " } else { "    " };
            lines.push(format!("{}{}", tag, name));
        }
        Ok(lines.join("\n"))
    }

    fn cmd_tree(&self, path: Option<&str>) -> Result<String> {
        let dir = path.map(|p| self.resolve(p)).unwrap_or_else(|| self.cwd.clone());
        if !dir.exists() {
            return Err(Error::not_found(dir.display().to_string()).with_operation("shell::tree"));
        }
        let root = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let mut lines = vec![root];
        build_tree(&dir, "", &mut lines)
            .map_err(|e| e.with_operation("shell::tree"))?;
        Ok(lines.join("\n"))
    }

    fn cmd_mkdir(&self, path: &str) -> Result<String> {
        std::fs::create_dir_all(self.resolve(path))
            .map_err(|e| Error::from(e).with_operation("shell::mkdir").with_context("path", path))?;
        Ok(format!("Directory '{}' created.", path))
    }

    fn cmd_touch(&self, file: &str) -> Result<String> {
        // Append mode: creates the file but never truncates existing content.
        std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.resolve(file))
            .map_err(|e| Error::from(e).with_operation("shell::touch").with_context("file", file))?;
        Ok(format!("File '{}' created.", file))
    }

    fn cmd_write(&self, file: &str, text: &str) -> Result<String> {
        use std::io::Write;

        let mut handle = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.resolve(file))
            .map_err(|e| Error::from(e).with_operation("shell::write").with_context("file", file))?;
        handle
            .write_all(text.as_bytes())
            .and_then(|_| handle.write_all(b"\n"))
            .map_err(|e| Error::from(e).with_operation("shell::write").with_context("file", file))?;
        Ok(format!("Text written to '{}'.", file))
    }

    fn cmd_read(&self, file: &str) -> Result<String> {
        let target = self.resolve(file);
        if !target.exists() {
            return Err(Error::not_found(file).with_operation("shell::read"));
        }
        std::fs::read_to_string(&target)
            .map_err(|e| Error::from(e).with_operation("shell::read").with_context("file", file))
    }

    fn cmd_rm(&self, path: &str, recursive: bool, force: bool) -> Result<String> {
        let target = self.resolve(path);

        if !target.exists() {
            if force {
                return Ok(format!("Removed '{}'.", path));
            }
            return Err(Error::not_found(path).with_operation("shell::rm"));
        }

        if target.is_dir() {
            if !recursive {
                return Err(Error::new(
                    ErrorKind::UsageInvalid,
                    format!("'{}' is a directory; pass recursive to remove it", path),
                )
                .with_operation("shell::rm"));
            }
            std::fs::remove_dir_all(&target)
                .map_err(|e| Error::from(e).with_operation("shell::rm").with_context("path", path))?;
        } else {
            std::fs::remove_file(&target)
                .map_err(|e| Error::from(e).with_operation("shell::rm").with_context("path", path))?;
        }

        if recursive {
            Ok(format!("Removed '{}' recursively.", path))
        } else {
            Ok(format!("Removed '{}'.", path))
        }
    }

    fn cmd_cp(&self, src: &str, dest: &str, recursive: bool) -> Result<String> {
        let from = self.resolve(src);
        let to = self.resolve(dest);

        if !from.exists() {
            return Err(Error::not_found(src).with_operation("shell::cp"));
        }

        if from.is_dir() {
            if !recursive {
                return Err(Error::new(
                    ErrorKind::UsageInvalid,
                    format!("'{}' is a directory; pass recursive to copy it", src),
                )
                .with_operation("shell::cp"));
            }
            copy_tree(&from, &to).map_err(|e| e.with_operation("shell::cp"))?;
        } else {
            std::fs::copy(&from, &to)
                .map_err(|e| Error::from(e).with_operation("shell::cp").with_context("src", src))?;
        }

        Ok(format!("Copied '{}' -> '{}'.", src, dest))
    }

    fn cmd_mv(&self, src: &str, dest: &str) -> Result<String> {
        let from = self.resolve(src);
        if !from.exists() {
            return Err(Error::not_found(src).with_operation("shell::mv"));
        }
        std::fs::rename(&from, self.resolve(dest))
            .map_err(|e| Error::from(e).with_operation("shell::mv").with_context("src", src))?;
        Ok(format!("Moved '{}' -> '{}'.", src, dest))
    }

    async fn cmd_fetch(&self, url: &str, dest: Option<&str>) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network_failed(e.to_string()).with_operation("shell::fetch").with_context("url", url))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::network_failed(e.to_string()).with_operation("shell::fetch").with_context("url", url))?;

        if let Some(dest) = dest {
            std::fs::write(self.resolve(dest), &bytes)
                .map_err(|e| Error::from(e).with_operation("shell::fetch").with_context("dest", dest))?;
            return Ok(format!("Saved to '{}' ({} bytes).", dest, bytes.len()));
        }

        // Inline responses are capped to keep the conversation log small.
        let text = String::from_utf8_lossy(&bytes);
        Ok(truncate_utf8(&text, FETCH_INLINE_LIMIT).to_string())
    }

    async fn cmd_exec(&self, command: &str) -> Result<String> {
        let mut cmd = if cfg!(windows) {
            let mut c = tokio::process::Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = tokio::process::Command::new("sh");
            c.arg("-c").arg(command);
            c
        };

        let mut child = cmd
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop: a dropped shell must not leave the subprocess
            // running detached.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::from(e).with_operation("shell::exec").with_context("command", command))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::unexpected("child stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::unexpected("child stderr was not captured"))?;

        // Drain both streams as they arrive so a chatty process is stopped
        // the moment it crosses the output cap, not after it exits.
        let cap = self.exec_output_cap;
        let drain = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let mut out_chunk = [0u8; 8192];
            let mut err_chunk = [0u8; 8192];
            let mut out_open = true;
            let mut err_open = true;

            while out_open || err_open {
                if out.len() + err.len() > cap {
                    return Ok::<_, std::io::Error>((None, out, err));
                }
                tokio::select! {
                    n = stdout.read(&mut out_chunk), if out_open => {
                        let n = n?;
                        if n == 0 {
                            out_open = false;
                        } else {
                            out.extend_from_slice(&out_chunk[..n]);
                        }
                    }
                    n = stderr.read(&mut err_chunk), if err_open => {
                        let n = n?;
                        if n == 0 {
                            err_open = false;
                        } else {
                            err.extend_from_slice(&err_chunk[..n]);
                        }
                    }
                }
            }

            let status = child.wait().await?;
            Ok((Some(status), out, err))
        };

        let (status, out, err) = match tokio::time::timeout(self.exec_timeout, drain).await {
            Ok(result) => result
                .map_err(|e| Error::from(e).with_operation("shell::exec").with_context("command", command))?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(Error::timeout("exec", self.exec_timeout.as_secs())
                    .with_operation("shell::exec")
                    .with_context("command", command));
            }
        };

        let Some(status) = status else {
            let _ = child.kill().await;
            return Err(Error::subprocess_failed(format!("output exceeded {} bytes", cap))
                .with_operation("shell::exec")
                .with_context("command", command));
        };

        let mut combined = String::from_utf8_lossy(&out).into_owned();
        combined.push_str(&String::from_utf8_lossy(&err));

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".into());
            return Err(Error::subprocess_failed(combined)
                .with_operation("shell::exec")
                .with_context("command", command)
                .with_context("exit", code));
        }

        Ok(combined)
    }

    fn cmd_chrome(&self, url: Option<&str>) -> Result<String> {
        let url = url.unwrap_or("").trim();

        let mut cmd = if cfg!(windows) {
            let mut c = std::process::Command::new("cmd");
            c.arg("/C").arg("start").arg("");
            if !url.is_empty() {
                c.arg(url);
            }
            c
        } else if cfg!(target_os = "macos") {
            let mut c = std::process::Command::new("open");
            c.arg(if url.is_empty() { "about:blank" } else { url });
            c
        } else {
            let mut c = std::process::Command::new("xdg-open");
            c.arg(if url.is_empty() { "about:blank" } else { url });
            c
        };

        // Launch failures are reported as text so a headless environment
        // never aborts a conversation turn.
        match cmd.current_dir(&self.cwd).spawn() {
            Ok(_) => {
                if url.is_empty() {
                    Ok("Browser opened.".into())
                } else {
                    Ok(format!("Browser opened at {}.", url))
                }
            }
            Err(e) => Ok(format!("Failed to open browser: {}", e)),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn require_str(args: &Map<String, Value>, key: &str) -> Result<String> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(Error::protocol_invalid(format!(
            "parameter '{}' must be a string, got {}",
            key, other
        ))),
        None => Err(Error::protocol_invalid(format!(
            "missing required parameter '{}'",
            key
        ))),
    }
}

fn opt_str(args: &Map<String, Value>, key: &str) -> Option<String> {
    match args.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(args: &Map<String, Value>, key: &str) -> bool {
    matches!(args.get(key), Some(Value::Bool(true)))
}

/// Cut `text` to at most `limit` bytes without splitting a character.
fn truncate_utf8(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let mut entries = std::fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(Error::from)?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

fn build_tree(dir: &Path, prefix: &str, lines: &mut Vec<String>) -> Result<()> {
    let entries = read_dir_sorted(dir)?;
    let last = entries.len().saturating_sub(1);

    for (i, entry) in entries.iter().enumerate() {
        let connector = if i == last { "└── " } else { "├── " };
        let name = entry.file_name().to_string_lossy().into_owned();
        lines.push(format!("{}{}{}", prefix, connector, name));

        // DirEntry::file_type does not follow symlinks, so a symlinked
        // directory is listed but never descended into (cycle guard).
        let file_type = entry.file_type().map_err(Error::from)?;
        if file_type.is_dir() {
            let sub = format!("{}{}", prefix, if i == last { "    " } else { "│   " });
            build_tree(&entry.path(), &sub, lines)?;
        }
    }

    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)?.collect::<std::io::Result<Vec<_>>>()? {
        let file_type = entry.file_type()?;
        let target = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shellpilot_error::ErrorKind;
    use tempfile::TempDir;

    fn shell() -> (TempDir, CommandShell) {
        let dir = TempDir::new().unwrap();
        let shell = CommandShell::with_cwd(dir.path());
        (dir, shell)
    }

    fn no_args() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn test_catalog_matches_shell_commands() {
        let (_dir, shell) = shell();
        shell.verify_catalog().unwrap();
    }

    #[tokio::test]
    async fn test_pwd_reports_cwd() {
        let (dir, mut shell) = shell();
        let out = shell.dispatch("pwd", &no_args()).await.unwrap();
        assert_eq!(out, dir.path().display().to_string());
    }

    #[tokio::test]
    async fn test_cd_into_missing_directory_keeps_cwd() {
        let (dir, mut shell) = shell();
        let err = shell.run_line("cd does-not-exist").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(shell.cwd(), dir.path());
    }

    #[tokio::test]
    async fn test_cd_changes_cwd() {
        let (dir, mut shell) = shell();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let out = shell.run_line("cd sub").await.unwrap();
        assert!(out.starts_with("Current directory: "));
        assert_eq!(shell.cwd(), dir.path().join("sub").canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_cd_rejects_files() {
        let (dir, mut shell) = shell();
        std::fs::write(dir.path().join("plain.txt"), "x").unwrap();

        let err = shell.run_line("cd plain.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageInvalid);
    }

    #[tokio::test]
    async fn test_mkdir_is_idempotent() {
        let (dir, mut shell) = shell();
        shell.run_line("mkdir a/b/c").await.unwrap();
        shell.run_line("mkdir a/b/c").await.unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[tokio::test]
    async fn test_write_appends_and_read_round_trips() {
        let (_dir, mut shell) = shell();
        shell.run_line("write notes.txt a").await.unwrap();
        shell.run_line("write notes.txt b").await.unwrap();

        let out = shell.run_line("read notes.txt").await.unwrap();
        assert_eq!(out, "a\nb\n");
    }

    #[tokio::test]
    async fn test_write_rest_parameter_keeps_spaces() {
        let (_dir, mut shell) = shell();
        shell.run_line("write notes.txt hello from the shell").await.unwrap();

        let out = shell.run_line("read notes.txt").await.unwrap();
        assert_eq!(out, "hello from the shell\n");
    }

    #[tokio::test]
    async fn test_touch_never_truncates() {
        let (dir, mut shell) = shell();
        std::fs::write(dir.path().join("keep.txt"), "precious").unwrap();

        shell.run_line("touch keep.txt").await.unwrap();
        let out = shell.run_line("read keep.txt").await.unwrap();
        assert_eq!(out, "precious");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_not_found() {
        let (_dir, mut shell) = shell();
        let err = shell.run_line("read nope.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rm_directory_requires_recursive() {
        let (dir, mut shell) = shell();
        std::fs::create_dir(dir.path().join("d")).unwrap();

        let err = shell.run_line("rm d").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageInvalid);
        assert!(dir.path().join("d").exists());

        shell.run_line("rm --recursive d").await.unwrap();
        assert!(!dir.path().join("d").exists());
    }

    #[tokio::test]
    async fn test_rm_force_suppresses_missing_target() {
        let (_dir, mut shell) = shell();
        let err = shell.run_line("rm ghost.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        shell.run_line("rm --force ghost.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_rm_short_flag_group() {
        let (dir, mut shell) = shell();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        std::fs::write(dir.path().join("d/x.txt"), "x").unwrap();

        let out = shell.run_line("rm -rf d").await.unwrap();
        assert_eq!(out, "Removed 'd' recursively.");
        assert!(!dir.path().join("d").exists());
    }

    #[tokio::test]
    async fn test_cp_directory_requires_recursive() {
        let (dir, mut shell) = shell();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/f.txt"), "data").unwrap();

        let err = shell.run_line("cp src dst").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageInvalid);

        shell.run_line("cp --recursive src dst").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dst/f.txt")).unwrap(),
            "data"
        );
    }

    #[tokio::test]
    async fn test_mv_renames() {
        let (dir, mut shell) = shell();
        std::fs::write(dir.path().join("old.txt"), "data").unwrap();

        let out = shell.run_line("mv old.txt new.txt").await.unwrap();
        assert_eq!(out, "Moved 'old.txt' -> 'new.txt'.");
        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("new.txt")).unwrap(),
            "data"
        );
    }

    #[tokio::test]
    async fn test_ls_sorted_with_directory_tags() {
        let (dir, mut shell) = shell();
        std::fs::create_dir(dir.path().join("zdir")).unwrap();
        std::fs::write(dir.path().join("afile"), "").unwrap();

        let out = shell.run_line("ls").await.unwrap();
        assert_eq!(out, "    afile\n[D] zdir");
    }

    #[tokio::test]
    async fn test_tree_layout() {
        let (dir, mut shell) = shell();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/inner.txt"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();

        let out = shell.run_line("tree").await.unwrap();
        let expected_tail = "├── a\n│   └── inner.txt\n└── b.txt";
        let (_root, rest) = out.split_once('\n').unwrap();
        assert_eq!(rest, expected_tail);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_returns_combined_output() {
        let (_dir, mut shell) = shell();
        let out = shell.run_line("exec echo hello").await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_runs_under_cwd() {
        let (dir, mut shell) = shell();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        shell.run_line("cd sub").await.unwrap();

        shell.run_line("exec touch here.txt").await.unwrap();
        assert!(dir.path().join("sub/here.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_nonzero_exit_is_subprocess_failure() {
        let (_dir, mut shell) = shell();
        let err = shell
            .run_line("exec sh -c 'echo boom >&2; exit 3'")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubprocessFailed);
        assert!(err.message().contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_timeout_kills_and_leaves_shell_usable() {
        let dir = TempDir::new().unwrap();
        let mut shell = CommandShell::with_cwd(dir.path())
            .with_exec_timeout(std::time::Duration::from_millis(100));

        let err = shell.run_line("exec sleep 5").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let out = shell.run_line("pwd").await.unwrap();
        assert_eq!(out, dir.path().display().to_string());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_output_cap_stops_runaway_process() {
        let dir = TempDir::new().unwrap();
        let mut shell = CommandShell::with_cwd(dir.path()).with_exec_output_cap(1000);

        // The cap must cut the command off mid-stream, well before the
        // trailing sleep finishes.
        let start = std::time::Instant::now();
        let err = shell
            .run_line("exec head -c 5000 /dev/zero; sleep 5")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubprocessFailed);
        assert!(start.elapsed() < std::time::Duration::from_secs(3));

        let out = shell.run_line("pwd").await.unwrap();
        assert_eq!(out, dir.path().display().to_string());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_usable_after_exec_failure() {
        let (dir, mut shell) = shell();
        let _ = shell.run_line("exec false").await.unwrap_err();

        let out = shell.run_line("pwd").await.unwrap();
        assert_eq!(out, dir.path().display().to_string());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unknown_command_falls_back_to_subprocess() {
        let (_dir, mut shell) = shell();
        let out = shell.run_line("echo direct").await.unwrap();
        assert_eq!(out, "direct\n");
    }

    /// Minimal HTTP server handing out the same body on every connection.
    async fn spawn_http_server(body: String) -> std::net::SocketAddr {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let mut buf = [0u8; 1024];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_fetch_inline_truncates_to_byte_limit() {
        let dir = TempDir::new().unwrap();
        let mut shell = CommandShell::with_cwd(dir.path());
        let addr = spawn_http_server("x".repeat(5000)).await;

        let out = shell
            .run_line(&format!("fetch http://{}/", addr))
            .await
            .unwrap();
        assert_eq!(out.len(), 1024);
        assert!(out.bytes().all(|b| b == b'x'));
    }

    #[tokio::test]
    async fn test_fetch_dest_saves_full_body_and_reports_count() {
        let dir = TempDir::new().unwrap();
        let mut shell = CommandShell::with_cwd(dir.path());
        let addr = spawn_http_server("y".repeat(5000)).await;

        let out = shell
            .run_line(&format!("fetch http://{}/ body.bin", addr))
            .await
            .unwrap();
        assert_eq!(out, "Saved to 'body.bin' (5000 bytes).");
        assert_eq!(std::fs::read(dir.path().join("body.bin")).unwrap().len(), 5000);
    }

    #[test]
    fn test_inline_truncation_keeps_char_boundaries() {
        let text = "é".repeat(1000); // two bytes per char
        let cut = truncate_utf8(&text, 1024);
        assert_eq!(cut.len(), 1024);
        assert!(cut.chars().all(|c| c == 'é'));

        // an odd limit lands mid-character and backs up to the boundary
        let cut = truncate_utf8(&text, 1023);
        assert_eq!(cut.len(), 1022);

        assert_eq!(truncate_utf8("short", 1024), "short");
    }

    #[tokio::test]
    async fn test_empty_line_is_a_no_op() {
        let (_dir, mut shell) = shell();
        let out = shell.run_line("   ").await.unwrap();
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unknown_argument() {
        let (_dir, mut shell) = shell();
        let mut args = Map::new();
        args.insert("bogus".into(), Value::String("x".into()));

        let err = shell.dispatch("pwd", &args).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolInvalid);
    }

    #[tokio::test]
    async fn test_help_lists_every_command() {
        let (_dir, mut shell) = shell();
        let help = shell.run_line("help").await.unwrap();
        for name in CommandShell::COMMANDS {
            assert!(help.contains(name), "help missing '{}'", name);
        }
    }
}
