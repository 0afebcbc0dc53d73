// apps/mp_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 验证配置文件和输入快照的正确性。

use anyhow::{bail, Result};
use clap::Args;
use mp_config::ForecastConfig;
use mp_io::{GridInput, GridSummary};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输入快照路径
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== MariHydro 配置验证 ===");

    if args.config.is_none() && args.input.is_none() {
        println!("用法: mp_cli validate --config <配置文件> [--input <输入快照>]");
        println!("      mp_cli validate --input <输入快照>");
        return Ok(());
    }

    let mut result = ValidationResult::default();

    let config = match &args.config {
        Some(path) => validate_config(path, &mut result),
        None => None,
    };

    if let Some(path) = &args.input {
        validate_input(path, config.as_ref(), &mut result);
    }

    print_validation_result(&result, args.strict)
}

fn validate_config(path: &Path, result: &mut ValidationResult) -> Option<ForecastConfig> {
    println!("\n检查配置文件: {}", path.display());

    if !path.exists() {
        result.add_error(format!("配置文件不存在: {}", path.display()));
        return None;
    }

    let config = match ForecastConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            result.add_error(e.to_string());
            return None;
        }
    };

    if config.save_interval > config.n_steps {
        result.add_warning(format!(
            "快照间隔 {} 大于步数 {}，只会输出起始和最终时刻",
            config.save_interval, config.n_steps
        ));
    }

    println!("  ✓ 配置文件有效");
    Some(config)
}

fn validate_input(path: &Path, config: Option<&ForecastConfig>, result: &mut ValidationResult) {
    println!("\n检查输入快照: {}", path.display());

    let grid = match GridInput::load(path).and_then(GridInput::into_grid) {
        Ok(grid) => grid,
        Err(e) => {
            result.add_error(e.to_string());
            return;
        }
    };

    let summary = GridSummary::from_grid(&grid);
    if summary.is_empty() {
        result.add_warning("浓度场无正值单元，预报将退化为单一时刻");
    }
    if summary.max_speed == 0.0 {
        result.add_warning("流速场全为零");
    }
    if let Some(config) = config {
        let particles = summary.positive_cells * config.particles_per_cell;
        println!("  预计粒子数: {}", particles);
    }

    println!(
        "  ✓ 输入快照有效: {} x {}, 约定 {}",
        summary.shape.0, summary.shape.1, summary.convention
    );
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
            println!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    let success = if strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };

    if success {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
