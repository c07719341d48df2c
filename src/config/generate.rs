pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# ALARMETL CONFIGURATION
# =============================================================================
# Ingests formulation-control log files, extracts alarm events and loads them
# into a DuckDB database.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/alarmetl/config.yml
#   3. /etc/alarmetl/config.yml
#
# Paths may use ~ and $env{VAR} references.

# =============================================================================
# SOURCE
# =============================================================================
source:
  # Flat directory holding the log files
  directory: ~/alarmetl/logs_formulation
  # Only files with this extension are read (case-insensitive)
  extension: .log
  # Tried in order; the first encoding that decodes the whole file wins.
  # Supported: utf-8, latin-1, iso-8859-1, cp1252, windows-1252, cp850
  encodings:
    - utf-8
    - latin-1
    - iso-8859-1
    - cp1252
    - windows-1252
    - cp850
  # Descend into subdirectories
  recursive: false

# =============================================================================
# PARSER
# =============================================================================
parser:
  # Lines without any of these substrings are skipped before pattern matching
  markers:
    - CFN
    - OK
    - acknowledged
  # Marker that classifies a timestamped alarm line as CONFIRMED
  confirmation_marker: CFN
  # Marker that classifies a timestamped alarm line as RESOLVED
  resolution_marker: OK

# =============================================================================
# STORAGE
# =============================================================================
storage:
  path: ~/alarmetl/database/alarm_events.duckdb
  # Events written per transaction
  batch_size: 1000
"#
    .to_string()
}
