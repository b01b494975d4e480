use anyhow::{Context, Result};
use clap::Parser;
use idf_resample::{
    read_grid, write_grid, ConflictMethod, Grid, GridFormat, IdwParameters, ResampleMethod,
    ResampleSettings, ZoneResampler,
};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 入力IDF/ASCファイル、またはディレクトリ
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// 出力ディレクトリ
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// ゾーングリッド（省略時は欠損セルから生成）
    #[arg(short, long, value_name = "FILE")]
    zone: Option<PathBuf>,

    /// リサンプル手法: nn, idw, min, max, mean, percentile
    #[arg(short, long, default_value = "nn")]
    method: ResampleMethod,

    /// 最近傍法で複数の近傍値を統合する方法: avg, harm, min, max
    #[arg(long, default_value = "avg")]
    conflict: ConflictMethod,

    /// IDWの距離べき数
    #[arg(long, default_value_t = 2.0)]
    idw_power: f64,

    /// IDWの平滑化係数
    #[arg(long, default_value_t = 0.0)]
    idw_smoothing: f64,

    /// IDWで参照する最大距離
    #[arg(long)]
    idw_max_distance: Option<f64>,

    /// パーセンタイル値（0-100）
    #[arg(long)]
    percentile: Option<u8>,

    /// 統計ウィンドウの半径（セル数、0でゾーン全体）
    #[arg(long, default_value_t = 0)]
    stat_distance: usize,

    /// 斜め方向の近傍を使わない
    #[arg(long)]
    skip_diagonal: bool,

    /// GeoTIFF形式で出力
    #[arg(long)]
    geotiff: bool,

    /// 並列処理スレッド数（デフォルト: CPUコア数）
    #[arg(short, long)]
    threads: Option<usize>,
}

impl Args {
    fn settings(&self) -> ResampleSettings {
        ResampleSettings {
            method: self.method,
            conflict_method: self.conflict,
            idw: IdwParameters {
                power: self.idw_power,
                smoothing: self.idw_smoothing,
                max_distance: self.idw_max_distance,
            },
            percentile: self.percentile,
            stat_distance: self.stat_distance,
            skip_diagonal: self.skip_diagonal,
        }
    }
}

/// ファイル間で共有する実行コンテキスト
struct Job<'a> {
    args: &'a Args,
    resampler: ZoneResampler,
    zone: Option<Grid>,
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt::init();

    // CLI引数の解析
    let args = Args::parse();

    // 処理開始時間を記録
    let start_time = std::time::Instant::now();

    // スレッドプールの設定
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    if args.geotiff && !cfg!(feature = "gdal") {
        anyhow::bail!("GeoTIFF output requires building with the 'gdal' feature");
    }

    // 統計手法はゾーンの自動生成に対応しない
    if args.zone.is_none() && args.method.is_statistic() {
        anyhow::bail!("Method '{}' requires --zone", args.method);
    }

    // 設定の検証とストラテジーの構築
    let resampler = ZoneResampler::new(&args.settings())?;
    info!("Method: {}", resampler.strategy_name());

    // ゾーンは一度だけ読み込む
    let zone = match &args.zone {
        Some(path) => {
            info!("Loading zone grid: {:?}", path);
            Some(read_grid(path).with_context(|| format!("Failed to read zone {:?}", path))?)
        }
        None => None,
    };

    // 出力ディレクトリの作成
    fs::create_dir_all(&args.output)?;

    let job = Job {
        args: &args,
        resampler,
        zone,
    };

    // 入力パスの処理
    if args.input.is_file() {
        if GridFormat::from_path(&args.input).is_none() {
            error!("Unsupported file type: {:?}", args.input);
            anyhow::bail!("Input file must be .idf or .asc");
        }
        process_file(&args.input, &job)?;
    } else if args.input.is_dir() {
        // ディレクトリの処理
        info!("Processing directory: {:?}", args.input);
        process_directory(&args.input, &job)?;
    } else {
        error!("Invalid input path: {:?}", args.input);
        anyhow::bail!("Input path must be a file or directory");
    }

    // 処理時間を表示
    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}

fn process_file(path: &Path, job: &Job<'_>) -> Result<()> {
    info!("Processing file: {:?}", path);

    let values = read_grid(path).with_context(|| format!("Failed to read {:?}", path))?;

    let outcome = match &job.zone {
        Some(zone) => job.resampler.run(&values, zone)?,
        None => job.resampler.run_derived(&values)?,
    };
    if outcome.summary.unresolved > 0 {
        warn!(
            "{:?}: {} cells left without a value",
            path, outcome.summary.unresolved
        );
    }

    let output_path = output_path_for(path, &job.args.output, job.args.geotiff)?;
    write_output(&outcome.grid, &output_path, job)?;
    info!("Written: {:?}", output_path);

    Ok(())
}

fn output_path_for(input: &Path, output_dir: &Path, geotiff: bool) -> Result<PathBuf> {
    let file_name = input
        .file_name()
        .with_context(|| format!("Input has no file name: {:?}", input))?;
    let mut output = output_dir.join(file_name);
    if geotiff {
        output.set_extension("tif");
    }
    Ok(output)
}

#[cfg(feature = "gdal")]
fn write_output(grid: &Grid, output_path: &Path, job: &Job<'_>) -> Result<()> {
    if job.args.geotiff {
        let writer = idf_resample::GeoTiffWriter::new();
        return writer.write_with_method(grid, output_path, job.resampler.strategy_name());
    }
    write_grid(grid, output_path)?;
    Ok(())
}

#[cfg(not(feature = "gdal"))]
fn write_output(grid: &Grid, output_path: &Path, _job: &Job<'_>) -> Result<()> {
    write_grid(grid, output_path)?;
    Ok(())
}

fn process_directory(dir: &Path, job: &Job<'_>) -> Result<()> {
    // IDF/ASCファイルを再帰的に収集
    let input_files = collect_input_files(dir)?;
    info!("Found {} input files (IDF/ASC)", input_files.len());

    // 並列処理でファイルを変換
    let results: Vec<Result<()>> = input_files
        .par_iter()
        .map(|path| process_file(path, job))
        .collect();

    // エラーをチェック
    let mut errors = Vec::new();
    for (path, result) in input_files.iter().zip(results) {
        if let Err(e) = result {
            errors.push(format!("{}: {:#}", path.display(), e));
        }
    }

    if !errors.is_empty() {
        error!("Failed to process {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} files failed to process", errors.len());
    }

    Ok(())
}

fn collect_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries: Result<Vec<_>, _> = fs::read_dir(dir)?.collect();
    let entries = entries?;

    // エントリを並列処理
    let nested: Vec<Vec<PathBuf>> = entries
        .into_par_iter()
        .map(|entry| -> Result<Vec<PathBuf>> {
            let path = entry.path();
            if path.is_dir() {
                // サブディレクトリを再帰的に探索
                collect_input_files(&path)
            } else if GridFormat::from_path(&path).is_some() {
                Ok(vec![path])
            } else {
                Ok(Vec::new())
            }
        })
        .collect::<Result<_>>()?;

    let mut files: Vec<PathBuf> = nested.into_iter().flatten().collect();
    files.sort();
    Ok(files)
}
