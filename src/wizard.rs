//! Line-based interactive flow that gathers the same request the flags do.

use crate::config::{Config, EvaluateRequest, MAX_SDK_TARGETS};
use crate::error::ConfigError;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub enum WizardOutcome {
    Run(EvaluateRequest),
    Cancelled,
}

pub struct Wizard<'a, R, W> {
    input: R,
    output: W,
    cfg: &'a Config,
}

impl<'a, R: BufRead, W: Write> Wizard<'a, R, W> {
    pub fn new(input: R, output: W, cfg: &'a Config) -> Self {
        Self { input, output, cfg }
    }

    pub fn run(mut self) -> Result<WizardOutcome> {
        let mut req = EvaluateRequest::default();

        let source = self.choose(
            "How do you want to provide the images?",
            &["Single image", "Directory of images"],
        )?;
        if source == 0 {
            req.image = Some(self.ask_path("Path to the image", false)?);
        } else {
            req.directory = Some(self.ask_path("Path to the image directory", true)?);
        }

        req.use_saas = self.confirm("Use the SaaS service?", true)?;
        req.use_sdk = self.confirm("Use the local SDK service?", true)?;

        if req.use_saas {
            let key = self.ask("SaaS API key", Some(""))?;
            req.saas_api_key = (!key.is_empty()).then_some(key);
        }

        if req.use_sdk {
            let options: Vec<String> = (1..=MAX_SDK_TARGETS)
                .map(|n| format!("{n} version{}", if n == 1 { "" } else { "s" }))
                .collect();
            let options: Vec<&str> = options.iter().map(String::as_str).collect();
            let count = self.choose("How many SDK versions do you want to use?", &options)? + 1;
            for i in 1..=count {
                let port = self.ask_port(&format!("Port for SDK version {i}"))?;
                let version = self.ask(&format!("Version label for SDK {i}"), Some(format!("v{i}").as_str()))?;
                req.sdk_ports.push(port);
                req.sdk_versions.push(version);
            }
        }

        let default_output = self.cfg.output.default_path.clone();
        req.output = Some(PathBuf::from(self.ask("Report output path", Some(default_output.as_str()))?));
        req.analyze_jpeg_quality = self.confirm("Analyze JPEG quality?", false)?;
        req.workers = Some(self.ask_workers()?);
        req.verbose = self.confirm("Show detailed output?", false)?;

        self.print_summary(&req)?;
        if !self.confirm("Run the evaluation with this configuration?", true)? {
            writeln!(self.output, "Cancelled by user.")?;
            return Ok(WizardOutcome::Cancelled);
        }
        Ok(WizardOutcome::Run(req))
    }

    fn print_summary(&mut self, req: &EvaluateRequest) -> Result<()> {
        writeln!(self.output, "\nConfiguration summary")?;
        if let Some(p) = &req.image {
            writeln!(self.output, "  Image:         {}", p.display())?;
        }
        if let Some(p) = &req.directory {
            writeln!(self.output, "  Directory:     {}", p.display())?;
        }
        if req.use_saas {
            writeln!(
                self.output,
                "  SaaS API key:  {}",
                mask_key(req.saas_api_key.as_deref().unwrap_or(""))
            )?;
        }
        for (i, (port, version)) in req.sdk_ports.iter().zip(&req.sdk_versions).enumerate() {
            writeln!(self.output, "  SDK {}:         port {port}, version {version}", i + 1)?;
        }
        if let Some(p) = &req.output {
            writeln!(self.output, "  Report:        {}", p.display())?;
        }
        writeln!(self.output, "  Workers:       {}", req.workers.unwrap_or_default())?;
        writeln!(self.output, "  Verbose:       {}", yes_no(req.verbose))?;
        writeln!(self.output, "  JPEG analysis: {}", yes_no(req.analyze_jpeg_quality))?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ConfigError::InteractiveAborted.into());
        }
        Ok(line.trim().to_string())
    }

    fn ask(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(d) if !d.is_empty() => write!(self.output, "? {prompt} [{d}]: ")?,
            _ => write!(self.output, "? {prompt}: ")?,
        }
        let answer = self.read_line()?;
        if answer.is_empty() {
            if let Some(d) = default {
                return Ok(d.to_string());
            }
        }
        Ok(answer)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        loop {
            let hint = if default { "Y/n" } else { "y/N" };
            write!(self.output, "? {prompt} ({hint}): ")?;
            match self.read_line()?.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }

    fn choose(&mut self, prompt: &str, options: &[&str]) -> Result<usize> {
        loop {
            writeln!(self.output, "? {prompt}")?;
            for (i, o) in options.iter().enumerate() {
                writeln!(self.output, "  {}) {o}", i + 1)?;
            }
            write!(self.output, "> ")?;
            let answer = self.read_line()?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => writeln!(self.output, "Choose a number between 1 and {}.", options.len())?,
            }
        }
    }

    fn ask_path(&mut self, prompt: &str, directory: bool) -> Result<PathBuf> {
        loop {
            let path = PathBuf::from(self.ask(prompt, None)?);
            let ok = if directory { path.is_dir() } else { path.is_file() };
            if ok {
                return Ok(path);
            }
            writeln!(self.output, "{} does not exist.", path.display())?;
        }
    }

    fn ask_port(&mut self, prompt: &str) -> Result<u16> {
        loop {
            match self.ask(prompt, None)?.parse::<u16>() {
                Ok(p) if p > 0 => return Ok(p),
                _ => writeln!(self.output, "Enter a port between 1 and 65535.")?,
            }
        }
    }

    fn ask_workers(&mut self) -> Result<usize> {
        let default = self.cfg.processing.workers.to_string();
        loop {
            match self.ask("Number of parallel workers", Some(default.as_str()))?.parse::<usize>() {
                Ok(n) if n > 0 => return Ok(n),
                _ => writeln!(self.output, "Enter a positive number.")?,
            }
        }
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(script: &str) -> Result<WizardOutcome> {
        let cfg = Config::default();
        let mut out = Vec::new();
        Wizard::new(Cursor::new(script.to_string()), &mut out, &cfg).run()
    }

    #[test]
    fn full_flow_builds_request() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!(
            "2\n{}\ny\ny\nsecret-key-123456\n2\n8080\n5.1\n9090\n\nout/r.md\ny\n3\nn\n\n",
            dir.path().display()
        );
        let WizardOutcome::Run(req) = run(&script).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(req.directory.as_deref(), Some(dir.path()));
        assert!(req.use_saas && req.use_sdk);
        assert_eq!(req.saas_api_key.as_deref(), Some("secret-key-123456"));
        assert_eq!(req.sdk_ports, [8080, 9090]);
        assert_eq!(req.sdk_versions, ["5.1", "v2"]);
        assert_eq!(req.output, Some(PathBuf::from("out/r.md")));
        assert!(req.analyze_jpeg_quality);
        assert_eq!(req.workers, Some(3));
        assert!(!req.verbose);
    }

    #[test]
    fn defaults_fill_skipped_answers() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!(
            "1\n{}\nn\ny\n1\n7000\n\n\n\n\n\ny\n",
            dir.path().join("face.jpg").display()
        );
        std::fs::write(dir.path().join("face.jpg"), b"x").unwrap();
        let WizardOutcome::Run(req) = run(&script).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(req.sdk_ports, [7000]);
        assert_eq!(req.sdk_versions, ["v1"]);
        assert_eq!(req.output, Some(PathBuf::from("reports/informe_liveness.md")));
        assert_eq!(req.workers, Some(5));
        assert!(!req.analyze_jpeg_quality && !req.use_saas);
    }

    #[test]
    fn declining_confirmation_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!("2\n{}\ny\nn\nkey\n\n\n\n\nn\n", dir.path().display());
        assert!(matches!(run(&script).unwrap(), WizardOutcome::Cancelled));
    }

    #[test]
    fn eof_is_a_config_error() {
        let err = run("1\n").err().unwrap();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::InteractiveAborted)
        );
    }

    #[test]
    fn invalid_answers_are_asked_again() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!(
            "9\n2\n/definitely/missing\n{}\nmaybe\ny\nn\nk\n\n\n0\n2\n\n\n",
            dir.path().display()
        );
        let WizardOutcome::Run(req) = run(&script).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(req.workers, Some(2));
        assert_eq!(req.directory.as_deref(), Some(dir.path()));
    }

    #[test]
    fn keys_are_masked() {
        assert_eq!(mask_key("abcdefghijklmnop"), "abcde...lmnop");
        assert_eq!(mask_key("short"), "*****");
    }
}
