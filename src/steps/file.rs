//! Lines that must be present in a text file

use converge::{ApplyContext, ApplyError, Detection, DetectionError, Host, HostCommand, Step};
use std::path::PathBuf;

/// Exact lines a file must contain, appended in order when missing
///
/// Existing content is never rewritten or reordered.
#[derive(Debug, Clone)]
pub struct LineInFile {
    name: String,
    path: PathBuf,
    lines: Vec<String>,
    privileged: bool,
    critical: bool,
}

impl LineInFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, lines: Vec<String>) -> Self {
        let path = path.into();
        Self {
            name: name.into(),
            privileged: super::needs_privilege(&path),
            path,
            lines,
            critical: false,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    fn missing<'a>(&'a self, contents: Option<&str>) -> Vec<&'a str> {
        let present: Vec<&str> = contents.map(|c| c.lines().collect()).unwrap_or_default();
        let mut missing: Vec<&str> = Vec::new();
        for line in &self.lines {
            if !present.contains(&line.as_str()) && !missing.contains(&line.as_str()) {
                missing.push(line);
            }
        }
        missing
    }
}

impl Step for LineInFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Ensure {} line(s) in {}", self.lines.len(), self.path.display())
    }

    fn kind(&self) -> &'static str {
        "line_in_file"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        let contents = host.read_file(&self.path)?;
        Ok(Detection::from_satisfied(
            self.missing(contents.as_deref()).is_empty(),
        ))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        // The file may have changed since detection
        let contents = ctx.host.read_file(&self.path)?;
        let missing = self.missing(contents.as_deref());
        if missing.is_empty() {
            return Ok("all lines already present".to_string());
        }

        if contents.is_none() {
            if let Some(parent) = self.path.parent() {
                ctx.host.run_checked(
                    &HostCommand::new("mkdir")
                        .arg("-p")
                        .arg(parent.to_string_lossy())
                        .privileged_if(self.privileged),
                )?;
            }
        }

        let mut updated = contents.unwrap_or_default();
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        for line in &missing {
            updated.push_str(line);
            updated.push('\n');
        }

        ctx.host.write_file(&self.path, &updated, self.privileged)?;
        Ok(format!(
            "appended {} line(s) to {}",
            missing.len(),
            self.path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::FakeHost;

    const RC: &str = "/home/dev/.zshrc";

    fn step() -> LineInFile {
        LineInFile::new(
            "zshrc",
            RC,
            vec![
                "source ~/.zsh/plugins/zsh-autosuggestions/zsh-autosuggestions.zsh".into(),
                "eval \"$(starship init zsh)\"".into(),
            ],
        )
    }

    #[test]
    fn test_detect_missing_file() {
        assert_eq!(step().detect(&FakeHost::new()).unwrap(), Detection::NeedsApply);
    }

    #[test]
    fn test_detect_requires_exact_lines() {
        let host = FakeHost::new().with_file(
            RC,
            "# eval \"$(starship init zsh)\"\nsource ~/.zsh/plugins/zsh-autosuggestions/zsh-autosuggestions.zsh\n",
        );
        assert_eq!(step().detect(&host).unwrap(), Detection::NeedsApply);

        host.set_file(
            RC,
            "export EDITOR=nvim\nsource ~/.zsh/plugins/zsh-autosuggestions/zsh-autosuggestions.zsh\neval \"$(starship init zsh)\"\n",
        );
        assert_eq!(step().detect(&host).unwrap(), Detection::AlreadySatisfied);
    }

    #[test]
    fn test_apply_creates_file() {
        let host = FakeHost::new();
        step().apply(&ApplyContext::new(&host, false)).unwrap();

        assert!(host.ran("mkdir -p /home/dev"));
        assert_eq!(
            host.file(RC).unwrap(),
            "source ~/.zsh/plugins/zsh-autosuggestions/zsh-autosuggestions.zsh\neval \"$(starship init zsh)\"\n"
        );
    }

    #[test]
    fn test_apply_appends_only_missing_and_keeps_content() {
        let host = FakeHost::new().with_file(
            RC,
            "export EDITOR=nvim\nsource ~/.zsh/plugins/zsh-autosuggestions/zsh-autosuggestions.zsh",
        );

        let detail = step().apply(&ApplyContext::new(&host, false)).unwrap();

        assert_eq!(detail, "appended 1 line(s) to /home/dev/.zshrc");
        assert_eq!(
            host.file(RC).unwrap(),
            "export EDITOR=nvim\nsource ~/.zsh/plugins/zsh-autosuggestions/zsh-autosuggestions.zsh\neval \"$(starship init zsh)\"\n"
        );
    }

    #[test]
    fn test_apply_rechecks_before_appending() {
        let host = FakeHost::new().with_file(
            RC,
            "source ~/.zsh/plugins/zsh-autosuggestions/zsh-autosuggestions.zsh\neval \"$(starship init zsh)\"\n",
        );

        let detail = step().apply(&ApplyContext::new(&host, false)).unwrap();

        assert_eq!(detail, "all lines already present");
        assert!(!host.ran("tee"));
    }

    #[test]
    fn test_duplicate_wanted_lines_appended_once() {
        let host = FakeHost::new();
        let step = LineInFile::new("dup", RC, vec!["a".into(), "a".into()]);
        step.apply(&ApplyContext::new(&host, false)).unwrap();
        assert_eq!(host.file(RC).unwrap(), "a\n");
    }
}
