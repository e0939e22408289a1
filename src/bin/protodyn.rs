//! protodyn CLI – Text/JSON <-> Protobuf-Binaer fuer die eingebauten Nachrichtentypen.

#[cfg(feature = "fast-alloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use protodyn::{catalog, codec, json, text_format, EncoderConfig, JsonOptions, MessageSchema};
use std::io::{IsTerminal, Read, Write};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "protodyn", about = "Protocol buffer binary <-> text/JSON conversion")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in message types
    Types,
    /// Encode text format or JSON to protobuf binary
    Encode(EncodeArgs),
    /// Decode protobuf binary to text format or JSON
    Decode(DecodeArgs),
    /// Dump protobuf binary without a schema (field numbers only)
    DecodeRaw(RawArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Args)]
struct EncodeArgs {
    /// Fully-qualified message type (see `protodyn types`)
    #[arg(short = 't', long = "type")]
    type_name: String,

    /// Input file (- for stdin)
    #[arg(short, long)]
    input: String,

    /// Output file (optional; without -o auto-derived, -o - = stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Input format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    from: Format,

    /// Skip unknown JSON properties and enum names instead of failing
    #[arg(long)]
    ignore_unknown_fields: bool,

    /// Write repeated scalars in packed encoding
    #[arg(long)]
    packed: bool,
}

#[derive(Args)]
struct DecodeArgs {
    /// Fully-qualified message type (see `protodyn types`)
    #[arg(short = 't', long = "type")]
    type_name: String,

    /// Input file (- for stdin)
    #[arg(short, long)]
    input: String,

    /// Output file (optional; without -o auto-derived, -o - = stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    to: Format,

    /// JSON: keep the proto field names instead of lowerCamelCase
    #[arg(long)]
    preserve_field_names: bool,

    /// JSON: emit unset scalar, list and map fields with their defaults
    #[arg(long)]
    include_defaults: bool,

    /// JSON: emit enum values as numbers
    #[arg(long)]
    enums_as_ints: bool,

    /// JSON: pretty-print with N spaces
    #[arg(long, value_name = "N")]
    indent: Option<usize>,
}

#[derive(Args)]
struct RawArgs {
    /// Input file (- for stdin)
    #[arg(short, long)]
    input: String,

    /// Output file (optional; without -o auto-derived, -o - = stdout)
    #[arg(short, long)]
    output: Option<String>,
}

impl EncodeArgs {
    fn json_options(&self) -> JsonOptions {
        let opts = JsonOptions::default();
        if self.ignore_unknown_fields { opts.with_ignore_unknown_fields() } else { opts }
    }

    fn encoder_config(&self) -> EncoderConfig {
        if self.packed { EncoderConfig::with_packed_repeated() } else { EncoderConfig::default() }
    }
}

impl DecodeArgs {
    fn json_options(&self) -> JsonOptions {
        let mut opts = JsonOptions::default();
        if self.preserve_field_names {
            opts = opts.with_preserve_field_names();
        }
        if self.include_defaults {
            opts = opts.with_include_defaults();
        }
        if self.enums_as_ints {
            opts = opts.with_integers_for_enums();
        }
        if let Some(width) = self.indent {
            opts = opts.with_indent(width);
        }
        opts
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Fehler: {e}");
        process::exit(1);
    }
}

/// `RUST_LOG` hat Vorrang, sonst bestimmt `-v` das Level.
fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Types => run_types(),
        Command::Encode(args) => run_encode(args),
        Command::Decode(args) => run_decode(args),
        Command::DecodeRaw(args) => run_decode_raw(args),
    }
}

fn run_types() -> Result<(), String> {
    write_to_output("-", |mut writer| {
        for name in catalog::message_names() {
            writeln!(writer, "{name}").map_err(|e| format!("Schreibfehler: {e}"))?;
        }
        writer.flush().map_err(|e| format!("Schreibfehler: {e}"))
    })
}

fn resolve_type(name: &str) -> Result<Arc<MessageSchema>, String> {
    catalog::lookup(name)
        .ok_or_else(|| format!("unbekannter Nachrichtentyp '{name}' (siehe `protodyn types`)"))
}

fn run_encode(args: EncodeArgs) -> Result<(), String> {
    let schema = resolve_type(&args.type_name)?;
    let input = read_input(&args.input)?;
    let text = std::str::from_utf8(&input)
        .map_err(|e| format!("Eingabe muss UTF-8 sein: {e}"))?;

    let message = match args.from {
        Format::Text => text_format::from_text(text, &schema)
            .map_err(|e| format!("Text-Parse-Fehler: {e}"))?,
        Format::Json => json::from_json(text, &schema, &args.json_options())
            .map_err(|e| format!("JSON-Parse-Fehler: {e}"))?,
    };
    let bytes = codec::encode_with_config(&message, &args.encoder_config())
        .map_err(|e| format!("Encode-Fehler: {e}"))?;
    log::info!("{}: {} bytes encoded", args.type_name, bytes.len());

    let output = resolve_output_path(args.output.as_deref(), &args.input, "bin")?;
    write_to_output(&output, |mut writer| {
        writer.write_all(&bytes)
            .and_then(|()| writer.flush())
            .map_err(|e| format!("Schreibfehler: {e}"))
    })
}

fn run_decode(args: DecodeArgs) -> Result<(), String> {
    let schema = resolve_type(&args.type_name)?;
    let input = load_decode_input(&args.input)?;
    let message = codec::decode(&input, &schema)
        .map_err(|e| format!("Decode-Fehler: {e}"))?;

    let (rendered, ext) = match args.to {
        Format::Text => (text_format::to_text(&message), "txt"),
        Format::Json => {
            let mut out = json::to_json(&message, &args.json_options())
                .map_err(|e| format!("JSON-Fehler: {e}"))?;
            out.push('\n');
            (out, "json")
        }
    };

    let output = resolve_output_path(args.output.as_deref(), &args.input, ext)?;
    write_to_output(&output, |mut writer| {
        writer.write_all(rendered.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| format!("Schreibfehler: {e}"))
    })
}

fn run_decode_raw(args: RawArgs) -> Result<(), String> {
    let input = load_decode_input(&args.input)?;
    let rendered = text_format::decode_raw(&input)
        .map_err(|e| format!("Decode-Fehler: {e}"))?;

    let output = resolve_output_path(args.output.as_deref(), &args.input, "txt")?;
    write_to_output(&output, |mut writer| {
        writer.write_all(rendered.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| format!("Schreibfehler: {e}"))
    })
}

fn read_input(path: &str) -> Result<Vec<u8>, String> {
    if path == "-" {
        if std::io::stdin().is_terminal() {
            eprintln!("Lese von stdin (Ctrl+D zum Beenden)...");
        }
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("Lesefehler (stdin): {e}"))?;
        Ok(buf)
    } else {
        std::fs::read(path).map_err(|e| format!("Lesefehler '{}': {e}", path))
    }
}

/// Binaer-Eingabe als gemappte Datei oder gelesener Puffer.
enum DecodeInput {
    Buf(Vec<u8>),
    #[cfg(feature = "mmap")]
    Mmap(memmap2::Mmap),
}

impl std::ops::Deref for DecodeInput {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            DecodeInput::Buf(v) => v,
            #[cfg(feature = "mmap")]
            DecodeInput::Mmap(m) => m,
        }
    }
}

/// Laedt die Binaer-Eingabe. Dateien werden mit `mmap` gemappt, stdin wird gelesen.
fn load_decode_input(path: &str) -> Result<DecodeInput, String> {
    if path != "-" {
        #[cfg(feature = "mmap")]
        {
            let file = std::fs::File::open(path)
                .map_err(|e| format!("Lesefehler '{}': {e}", path))?;
            // Leere Dateien lassen sich nicht mappen.
            if file.metadata().map(|m| m.len() == 0).unwrap_or(false) {
                return Ok(DecodeInput::Buf(Vec::new()));
            }
            let mmap = unsafe { memmap2::Mmap::map(&file) }
                .map_err(|e| format!("Mmap-Fehler '{}': {e}", path))?;
            return Ok(DecodeInput::Mmap(mmap));
        }
        #[cfg(not(feature = "mmap"))]
        {
            let buf = std::fs::read(path)
                .map_err(|e| format!("Lesefehler '{}': {e}", path))?;
            return Ok(DecodeInput::Buf(buf));
        }
    }
    let buf = read_input("-")?;
    Ok(DecodeInput::Buf(buf))
}

fn create_buf_writer(path: &str) -> Result<std::io::BufWriter<Box<dyn Write>>, String> {
    if path == "-" {
        Ok(std::io::BufWriter::new(Box::new(std::io::stdout())))
    } else {
        let file = std::fs::File::create(path)
            .map_err(|e| format!("Schreibfehler: {e}"))?;
        Ok(std::io::BufWriter::new(Box::new(file)))
    }
}

/// stdout direkt, Dateien ueber `<pfad>.tmp` und rename.
fn write_to_output(
    output_path: &str,
    write_fn: impl FnOnce(std::io::BufWriter<Box<dyn Write>>) -> Result<(), String>,
) -> Result<(), String> {
    if output_path == "-" {
        return write_fn(create_buf_writer("-")?);
    }

    let tmp_path = format!("{output_path}.tmp");
    let writer = create_buf_writer(&tmp_path)?;
    if let Err(e) = write_fn(writer) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    std::fs::rename(&tmp_path, output_path)
        .map_err(|e| format!("Rename-Fehler: {e}"))
}

/// Ziel fuer die Ausgabe: `-o` falls angegeben, stdout bei stdin-Eingabe,
/// sonst die Eingabedatei mit neuer Endung. Die Eingabe wird nie ueberschrieben.
fn resolve_output_path(explicit: Option<&str>, input: &str, ext: &str) -> Result<String, String> {
    if let Some(path) = explicit {
        return Ok(path.to_string());
    }
    if input == "-" {
        return Ok("-".into());
    }
    let path = std::path::Path::new(input);
    let stem = path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "ungueltiger Eingabepfad".to_string())?;
    let parent = path.parent().unwrap_or_else(|| std::path::Path::new(""));
    let derived = parent.join(format!("{stem}.{ext}"));
    if derived == path {
        return Err(format!("ohne -o wuerde '{input}' ueberschrieben"));
    }
    Ok(derived.to_string_lossy().to_string())
}
