//! End-to-end checks: a ruleset served in-process, driven by a local host

use ruleplug::fixer::Fixer;
use ruleplug::host::{LocalHost, RuleSetClient};
use ruleplug::syntax::scanner::Scanner;
use ruleplug::syntax::{Pos, Range};
use ruleplug::wire::{memory_pair, EvaluateExprOption, GetModuleContentOption};
use ruleplug::{
    ensure_no_error, impl_decode, BodySchema, BuiltinRuleSet, Error, Result, Rule, Runner,
    RunnerExt, Severity,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Reports the value of every `locals` attribute named `msg`
struct EchoMessage;

impl Rule for EchoMessage {
    fn name(&self) -> &str {
        "echo_message"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Notice
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        let schema = BodySchema::new().block("locals", &[], BodySchema::new().attribute("msg"));
        let content = runner.get_module_content(&schema, &GetModuleContentOption::default())?;
        for block in &content.blocks {
            if let Some(attr) = block.body.attributes.get("msg") {
                let msg: String = runner.evaluate_expr(&attr.expr, &EvaluateExprOption::default())?;
                runner.emit_issue(self, &msg, &attr.expr.range().clone())?;
            }
        }
        Ok(())
    }
}

/// Reports AMIs, skipping values it may not look at
struct AmiValue {
    saw_sensitive: Arc<AtomicBool>,
}

impl Rule for AmiValue {
    fn name(&self) -> &str {
        "ami_value"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        let schema = BodySchema::new().attribute("ami");
        let content =
            runner.get_resource_content("aws_instance", &schema, &GetModuleContentOption::default())?;
        for block in &content.blocks {
            let Some(attr) = block.body.attributes.get("ami") else {
                continue;
            };
            let result = runner.evaluate_expr::<String>(&attr.expr, &EvaluateExprOption::default());
            if matches!(result, Err(Error::SensitiveValue)) {
                self.saw_sensitive.store(true, Ordering::SeqCst);
            }
            ensure_no_error(result, |ami| {
                runner.emit_issue(self, &format!("ami is {}", ami), &attr.range)
            })?;
        }
        Ok(())
    }
}

/// Rewrites `#` comments as `//`
struct CommentSyntax {
    supported: bool,
}

impl Rule for CommentSyntax {
    fn name(&self) -> &str {
        "comment_syntax"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        for (name, file) in runner.get_files()? {
            let scanner = Scanner::new(file.bytes(), &name)?;
            for token in scanner.tokens() {
                if !token.is_line_comment() || !token.text.starts_with('#') {
                    continue;
                }
                let start = token.range.start;
                let hash = Range::new(
                    name.as_str(),
                    start,
                    Pos::new(start.line, start.column + 1, start.byte + 1),
                );
                let supported = self.supported;
                runner.emit_issue_with_fix(
                    self,
                    "Single line comments should begin with //",
                    &token.range,
                    &mut |fixer: &mut Fixer| {
                        if !supported {
                            return Err(Error::FixNotSupported);
                        }
                        fixer.replace_text(&hash, ["//"])
                    },
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AllowedConfig {
    allowed: Vec<String>,
}

impl_decode!(AllowedConfig { allowed => attr("allowed") });

/// Reports instance types outside the configured list
struct AllowedTypes;

impl Rule for AllowedTypes {
    fn name(&self) -> &str {
        "allowed_types"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        let mut config = AllowedConfig {
            allowed: vec!["t2.micro".to_string()],
        };
        runner.decode_rule_config(self.name(), &mut config)?;

        let schema = BodySchema::new().attribute("instance_type");
        let content =
            runner.get_resource_content("aws_instance", &schema, &GetModuleContentOption::default())?;
        for block in &content.blocks {
            let Some(attr) = block.body.attributes.get("instance_type") else {
                continue;
            };
            let kind: String = runner.evaluate_expr(&attr.expr, &EvaluateExprOption::default())?;
            if !config.allowed.contains(&kind) {
                runner.emit_issue(self, &format!("{} is not allowed", kind), &attr.range)?;
            }
        }
        Ok(())
    }
}

/// Collects `locals` values through the callback form of evaluation
struct CollectLocals {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Rule for CollectLocals {
    fn name(&self) -> &str {
        "collect_locals"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Notice
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        let schema = BodySchema::new().block(
            "locals",
            &[],
            BodySchema::new().attribute("greeting").attribute("hidden"),
        );
        let content = runner.get_module_content(&schema, &GetModuleContentOption::default())?;
        for block in &content.blocks {
            for attr in block.body.attributes.values() {
                let seen = self.seen.clone();
                let result = runner.evaluate_expr_with(
                    &attr.expr,
                    &EvaluateExprOption::default(),
                    |value: String| {
                        seen.lock().unwrap().push(value);
                        Ok(())
                    },
                );
                ensure_no_error(result, |()| Ok(()))?;
            }
        }
        Ok(())
    }
}

/// Reports the region of every `aws` provider
struct ProviderRegion;

impl Rule for ProviderRegion {
    fn name(&self) -> &str {
        "provider_region"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Notice
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        let schema = BodySchema::new().attribute("region");
        let content =
            runner.get_provider_content("aws", &schema, &GetModuleContentOption::default())?;
        for block in &content.blocks {
            if let Some(attr) = block.body.attributes.get("region") {
                let region: String =
                    runner.evaluate_expr(&attr.expr, &EvaluateExprOption::default())?;
                runner.emit_issue(self, &format!("region {}", region), &attr.range)?;
            }
        }
        Ok(())
    }
}

/// Emits one fixable issue per file, counting how often its fix runs
struct CountedFix {
    runs: Arc<AtomicUsize>,
}

impl Rule for CountedFix {
    fn name(&self) -> &str {
        "counted_fix"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        for name in runner.get_files()?.into_keys() {
            let runs = self.runs.clone();
            let at = Range::at(name.as_str(), Pos::START);
            runner.emit_issue_with_fix(self, "needs a header", &at, &mut |fixer: &mut Fixer| {
                runs.fetch_add(1, Ordering::SeqCst);
                fixer.insert_text_before(&at, "// header\n")
            })?;
        }
        Ok(())
    }
}

fn files(list: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
    list.iter()
        .map(|(n, s)| (n.to_string(), s.as_bytes().to_vec()))
        .collect()
}

/// Serve `rules` on a thread and run one check against `host`
fn run_check(rules: Vec<Box<dyn Rule>>, host: &mut LocalHost) -> Result<()> {
    let (host_side, plugin_side) = memory_pair();
    let plugin = std::thread::spawn(move || {
        let mut set = BuiltinRuleSet::new("testing", "0.1.0", rules);
        ruleplug::plugin::serve(&mut set, plugin_side)
    });
    let mut client = RuleSetClient::new(host_side);
    let result = client.check(host);
    drop(client);
    plugin.join().unwrap()?;
    result
}

#[test]
fn test_heredoc_crosses_the_wire() {
    let mut host = LocalHost::new(files(&[(
        "main.tf",
        "locals {\n  msg = <<EOT\nhello\nEOT\n}\n",
    )]))
    .unwrap();
    run_check(vec![Box::new(EchoMessage)], &mut host).unwrap();

    let issues = host.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].message, "hello\n");
    assert_eq!(issues[0].rule.name, "echo_message");
}

#[test]
fn test_sensitive_value_is_skipped() {
    let src = r#"
variable "ami" {
  default   = "ami-123"
  sensitive = true
}

resource "aws_instance" "web" {
  ami = var.ami
}

resource "aws_instance" "db" {
  ami = "ami-456"
}
"#;
    let mut host = LocalHost::new(files(&[("main.tf", src)])).unwrap();
    let saw_sensitive = Arc::new(AtomicBool::new(false));
    let rule = AmiValue {
        saw_sensitive: saw_sensitive.clone(),
    };
    run_check(vec![Box::new(rule)], &mut host).unwrap();

    assert!(saw_sensitive.load(Ordering::SeqCst));
    let messages: Vec<_> = host.issues().iter().map(|i| i.message.as_str()).collect();
    assert_eq!(messages, ["ami is ami-456"]);
}

#[test]
fn test_fixes_are_applied_when_enabled() {
    let src = "# one\nlocals {}\n# two\n";
    let mut host = LocalHost::new(files(&[("main.tf", src)]))
        .unwrap()
        .with_fix(true);
    run_check(vec![Box::new(CommentSyntax { supported: true })], &mut host).unwrap();

    assert_eq!(host.issues().len(), 2);
    assert!(host.issues().iter().all(|i| i.fixable && i.fixed));
    let changed = host.changed_files();
    assert_eq!(
        String::from_utf8_lossy(&changed["main.tf"]),
        "// one\nlocals {}\n// two\n"
    );
}

#[test]
fn test_fixes_are_dropped_when_disabled() {
    let mut host = LocalHost::new(files(&[("main.tf", "# one\n")])).unwrap();
    run_check(vec![Box::new(CommentSyntax { supported: true })], &mut host).unwrap();

    assert_eq!(host.issues().len(), 1);
    assert!(host.issues()[0].fixable);
    assert!(!host.issues()[0].fixed);
    assert!(host.changed_files().is_empty());
}

#[test]
fn test_unsupported_fix_is_reported_unfixable() {
    let mut host = LocalHost::new(files(&[("main.tf", "# one\n")]))
        .unwrap()
        .with_fix(true);
    run_check(vec![Box::new(CommentSyntax { supported: false })], &mut host).unwrap();

    assert_eq!(host.issues().len(), 1);
    assert!(!host.issues()[0].fixable);
    assert!(host.changed_files().is_empty());
}

#[test]
fn test_rule_config_is_decoded() {
    let src = r#"
resource "aws_instance" "a" {
  instance_type = "t2.micro"
}

resource "aws_instance" "b" {
  instance_type = "m5.large"
}
"#;
    let mut host = LocalHost::new(files(&[("main.tf", src)])).unwrap();
    run_check(vec![Box::new(AllowedTypes)], &mut host).unwrap();
    let messages: Vec<_> = host.issues().iter().map(|i| i.message.clone()).collect();
    assert_eq!(messages, ["m5.large is not allowed"]);

    let mut host = LocalHost::new(files(&[("main.tf", src)]))
        .unwrap()
        .with_rule_config("allowed_types", "allowed = [\"m5.large\"]\n")
        .unwrap();
    run_check(vec![Box::new(AllowedTypes)], &mut host).unwrap();
    let messages: Vec<_> = host.issues().iter().map(|i| i.message.clone()).collect();
    assert_eq!(messages, ["t2.micro is not allowed"]);
}

#[test]
fn test_rule_failure_aborts_check() {
    let mut host = LocalHost::new(files(&[(
        "main.tf",
        "locals {\n  msg = var.missing\n}\n",
    )]))
    .unwrap();
    let err = run_check(vec![Box::new(EchoMessage)], &mut host).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("failed to check \"echo_message\" rule"), "{}", message);
    assert!(message.contains("Failed to evaluate expression"), "{}", message);
}

#[test]
fn test_evaluate_callback_runs_once_and_skips_sentinels() {
    let src = r#"
variable "secret" {
  default   = "x"
  sensitive = true
}

locals {
  greeting = "hello"
  hidden   = var.secret
}
"#;
    let mut host = LocalHost::new(files(&[("main.tf", src)])).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let rule = CollectLocals { seen: seen.clone() };
    run_check(vec![Box::new(rule)], &mut host).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
}

#[test]
fn test_provider_content_is_filtered_by_name() {
    let src = r#"
provider "aws" {
  region = "us-east-1"
}

provider "google" {
  region = "europe-west1"
}
"#;
    let mut host = LocalHost::new(files(&[("main.tf", src)])).unwrap();
    run_check(vec![Box::new(ProviderRegion)], &mut host).unwrap();

    let messages: Vec<_> = host.issues().iter().map(|i| i.message.as_str()).collect();
    assert_eq!(messages, ["region us-east-1"]);
}

#[test]
fn test_fix_in_root_module_runs_closure() {
    let mut host = LocalHost::new(files(&[("main.tf", "locals {}\n")]))
        .unwrap()
        .with_fix(true);
    let runs = Arc::new(AtomicUsize::new(0));
    let rule = CountedFix { runs: runs.clone() };
    run_check(vec![Box::new(rule)], &mut host).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(host.issues()[0].fixable);
    assert!(host.changed_files().contains_key("main.tf"));
}

#[test]
fn test_fix_in_child_module_is_not_fixable() {
    let mut host = LocalHost::new(files(&[("main.tf", "locals {}\n")]))
        .unwrap()
        .with_fix(true)
        .with_module_path(vec!["network".to_string()]);
    let runs = Arc::new(AtomicUsize::new(0));
    let rule = CountedFix { runs: runs.clone() };
    run_check(vec![Box::new(rule)], &mut host).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(host.issues().len(), 1);
    assert!(!host.issues()[0].fixable);
    assert!(!host.issues()[0].fixed);
    assert!(host.changed_files().is_empty());
}
