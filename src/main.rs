//! CLI entry point for radial-profiles
//!
//! Provides command-line interface for checking profiles, listing them,
//! resolving a context by hand and encoding rules.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use radial_profiles::config::settings::DEFAULT_SETTINGS_PATH;
use radial_profiles::config::{expand_path, EngineSettings, ProfileDocument, ProfileRepository};
use radial_profiles::core::encoding::{encode_rule, parse_screen_area};
use radial_profiles::core::validator::validate_hierarchy;
use radial_profiles::core::{
    resolve_detailed, validate_record, validate_rule, Accelerator, ActivationReason, ActivationRule, ContextSnapshot,
    ProfileId, ProfileRecord, RuleMatcher, SliceTarget, TextPattern,
};
use radial_profiles::engine::profile_hotkeys;
use radial_profiles::hotkey::conflict::ConflictDetector;
use radial_profiles::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "radial-profiles")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the settings file
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    settings: String,

    /// Path to the profiles file (overrides settings)
    #[arg(short, long, global = true)]
    profiles: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every profile and its hotkeys
    Check,

    /// List all profiles
    List,

    /// Show which profile a context would activate
    Resolve {
        #[arg(long)]
        process: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        class: Option<String>,
        /// Screen rectangle as <x>x<y>:<w>x<h>
        #[arg(long)]
        rect: Option<String>,
        /// Pin this profile id instead of the stored pin
        #[arg(long)]
        pin: Option<String>,
    },

    /// Print the persisted forms of a rule
    EncodeRule {
        #[arg(long, value_enum)]
        mode: ModeArg,
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        regex: bool,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(long)]
        negate: bool,
        /// Screen rectangle as <x>x<y>:<w>x<h>
        #[arg(long)]
        rect: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Always,
    ProcessName,
    WindowTitle,
    WindowClass,
    ScreenArea,
    Custom,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings_path = expand_path(&cli.settings)?;
    let settings = EngineSettings::load(&settings_path)
        .with_context(|| format!("Failed to read settings: {}", settings_path.display()))?;

    if let Err(e) = logging::init(&settings.log_filter) {
        eprintln!("{} {}", "⚠".yellow(), e);
    }

    let profiles_path = match &cli.profiles {
        Some(raw) => expand_path(raw)?,
        None => settings.profiles_path()?,
    };

    match cli.command {
        Commands::Check => check_profiles(&settings, profiles_path)?,
        Commands::List => list_profiles(profiles_path)?,
        Commands::Resolve {
            process,
            title,
            class,
            rect,
            pin,
        } => {
            let mut context = ContextSnapshot::now();
            context.process_name = process;
            context.window_title = title;
            context.window_class = class;
            context.screen_rect = rect.as_deref().map(parse_screen_area).transpose()?;
            let pin = pin.as_deref().map(str::parse::<ProfileId>).transpose()?;

            resolve_context(profiles_path, &context, pin)?;
        }
        Commands::EncodeRule {
            mode,
            pattern,
            regex,
            case_sensitive,
            negate,
            rect,
        } => {
            let text = pattern.map(|pattern| TextPattern {
                pattern,
                is_regex: regex,
                case_sensitive,
            });
            encode(mode, text, rect.as_deref(), negate)?;
        }
    }

    Ok(())
}

fn load_document(path: PathBuf) -> anyhow::Result<(PathBuf, ProfileDocument)> {
    let repository = ProfileRepository::new(path)?;
    let document = repository
        .load()
        .with_context(|| format!("Failed to load profiles: {}", repository.path().display()))?;
    Ok((repository.path().to_path_buf(), document))
}

/// Validate profiles and report problems, exit 1 if any
fn check_profiles(settings: &EngineSettings, path: PathBuf) -> anyhow::Result<()> {
    let (path, document) = load_document(path)?;
    println!("{} Checking profiles: {}", "→".cyan(), path.display());
    println!("{} Found {} profiles\n", "✓".green(), document.profiles.len());

    let reserved = settings.reserved_shortcuts();
    let mut detector = ConflictDetector::new();
    let mut problems = 0;

    for record in &document.profiles {
        let mut issues: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        if let Err(errors) = validate_record(record) {
            issues.extend(errors.iter().map(ToString::to_string));
        } else if !validate_hierarchy(record).is_presentable() {
            warnings.push("Contains empty draft menus, it will never be activated".to_string());
        }

        for (id, raw) in profile_hotkeys(record) {
            let accelerator = match Accelerator::parse(&raw) {
                Ok(accelerator) => accelerator,
                Err(e) => {
                    issues.push(format!("{}: {}", id, e));
                    continue;
                }
            };

            if reserved.contains(&accelerator) {
                issues.push(format!("{}: '{}' is reserved by the platform", id, accelerator));
            }
            if let Some(holder) = detector.holder_other_than(&accelerator, &id).cloned() {
                issues.push(format!("{}: '{}' is already bound to {}", id, accelerator, holder));
            } else {
                detector.hold(accelerator, id);
            }
        }

        let marker = if issues.is_empty() { "✓".green().bold() } else { "✗".red().bold() };
        println!("{} {} {}", marker, record.profile.name.bold(), record.id().to_string().dimmed());
        for issue in &issues {
            println!("    {} {}", "•".red(), issue);
        }
        for warning in &warnings {
            println!("    {} {}", "•".yellow(), warning);
        }

        problems += issues.len();
    }

    if problems > 0 {
        println!(
            "\n{} Found {} problem{}",
            "✗".red().bold(),
            problems,
            if problems == 1 { "" } else { "s" }
        );
        std::process::exit(1);
    }

    println!("\n{} {}", "✓".green().bold(), "No problems detected!".bold());
    Ok(())
}

/// List all profiles in the document
fn list_profiles(path: PathBuf) -> anyhow::Result<()> {
    let (path, document) = load_document(path)?;
    println!("{}", format!("Profiles from: {}\n", path.display()).bold());

    for record in &document.profiles {
        let profile = &record.profile;

        let mut flags = Vec::new();
        if !profile.enabled {
            flags.push("disabled".red().to_string());
        }
        if document.pinned_profile_id == Some(profile.id) {
            flags.push("pinned".yellow().to_string());
        }

        println!("{} {} {}", profile.name.cyan().bold(), profile.id.to_string().dimmed(), flags.join(" "));

        if let Some(hotkey) = &profile.global_hotkey {
            println!("    hotkey  {}", hotkey.green());
        }
        if profile.activation_rules.is_empty() {
            println!("    rules   {}", "(fallback)".dimmed());
        }
        for rule in &profile.activation_rules {
            println!("    rule    {}", describe_rule(rule));
        }
        println!(
            "    menus   {} (depth {})",
            record.menus.len(),
            validate_hierarchy(record).depth
        );
    }

    println!("\n{} Total: {} profiles", "✓".green(), document.profiles.len());
    Ok(())
}

fn describe_rule(rule: &ActivationRule) -> String {
    let negate = if rule.negate { "not " } else { "" };
    match &rule.matcher {
        RuleMatcher::Always => format!("{}always", negate),
        RuleMatcher::ScreenArea(area) => format!("{}screen_area {}", negate, area),
        matcher => {
            let Some(pattern) = matcher.pattern() else {
                return matcher.mode().to_string();
            };
            let mut flags = Vec::new();
            if pattern.is_regex {
                flags.push("regex");
            }
            if pattern.case_sensitive {
                flags.push("case");
            }
            let flags = if flags.is_empty() { String::new() } else { format!(" [{}]", flags.join(",")) };
            format!("{}{} '{}'{}", negate, matcher.mode(), pattern.pattern, flags)
        }
    }
}

/// Resolve a context against the stored profiles
fn resolve_context(path: PathBuf, context: &ContextSnapshot, pin: Option<ProfileId>) -> anyhow::Result<()> {
    let (_, document) = load_document(path)?;
    let pin = pin.or(document.pinned_profile_id);

    let Some(resolution) = resolve_detailed(&document.profiles, context, pin) else {
        println!("{} {}", "∅".yellow(), "No profile is active for this context".bold());
        return Ok(());
    };

    let Some(record) = document.profiles.iter().find(|r| r.id() == resolution.profile_id) else {
        bail!("Resolved profile {} is missing", resolution.profile_id);
    };

    let reason = match resolution.reason {
        ActivationReason::Pinned => "pinned".to_string(),
        ActivationReason::Rule { rule_index } => format!("rule {} matched", rule_index),
        ActivationReason::Fallback => "fallback".to_string(),
    };
    println!("{} {} ({})", "✓".green(), record.profile.name.cyan().bold(), reason.dimmed());

    print_root_menu(record);
    Ok(())
}

fn print_root_menu(record: &ProfileRecord) {
    let Some(menu) = record.root_menu() else {
        return;
    };

    println!("\n  {}", menu.title.bold());
    for slice in menu.ordered_slices() {
        let target = match slice.target() {
            SliceTarget::Submenu(child) => {
                let title = record.menu(child).map(|m| m.title.as_str()).unwrap_or("?");
                format!("→ {}", title).magenta().to_string()
            }
            SliceTarget::Action(action) => action.to_string().dimmed().to_string(),
            SliceTarget::Unassigned => "(unassigned)".yellow().to_string(),
        };
        println!("  {} {} {}", format!("{}.", slice.order).dimmed(), slice.label, target);
    }
}

/// Print the v1 value-string form and the v2 tagged form of a rule
fn encode(mode: ModeArg, pattern: Option<TextPattern>, rect: Option<&str>, negate: bool) -> anyhow::Result<()> {
    let text = |pattern: Option<TextPattern>| pattern.context("--pattern is required for this mode");

    let matcher = match mode {
        ModeArg::Always => RuleMatcher::Always,
        ModeArg::ScreenArea => {
            let rect = rect.context("--rect is required for screen-area")?;
            RuleMatcher::ScreenArea(parse_screen_area(rect)?)
        }
        ModeArg::ProcessName => RuleMatcher::ProcessName(text(pattern)?),
        ModeArg::WindowTitle => RuleMatcher::WindowTitle(text(pattern)?),
        ModeArg::WindowClass => RuleMatcher::WindowClass(text(pattern)?),
        ModeArg::Custom => RuleMatcher::Custom(text(pattern)?),
    };

    let rule = ActivationRule { matcher, negate };
    validate_rule(0, &rule)?;

    println!("{} {}", "v1".dimmed(), serde_json::to_string(&encode_rule(&rule))?);
    println!("{} {}", "v2".dimmed(), serde_json::to_string(&rule)?);
    Ok(())
}
