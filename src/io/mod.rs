// Copyright 2025 Ramble Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Relation input/output
//!
//! Readers and writers are constructed from the directive map of an `Io`
//! statement and bound to the interning services. The `IO` directive picks
//! the provider (`file` by default, `stdout`, `stdoutprintsize`); `types`
//! gives the per-column codes `s|i|u|f` (default all `i`); `delimiter`
//! defaults to tab. Providers are registered by key, so embedders can add
//! their own transports.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{
    as_float, as_unsigned, from_float, from_unsigned, Error, RamDomain, RamFloat, RamUnsigned,
    RecordTable, Result, SymbolTable, Tuple,
};
use crate::ram::DirectiveMap;
use crate::relation::Relation;

/// Per-column value code of the TSV formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Symbol,
    Signed,
    Unsigned,
    Float,
}

impl ColumnType {
    fn from_code(code: &str) -> Result<ColumnType> {
        match code {
            "s" => Ok(ColumnType::Symbol),
            "i" => Ok(ColumnType::Signed),
            "u" => Ok(ColumnType::Unsigned),
            "f" => Ok(ColumnType::Float),
            other => Err(Error::parse(format!("unknown column type code '{other}'"))),
        }
    }
}

/// Resolve the column types of a directive map against a relation arity.
fn column_types(directives: &DirectiveMap, arity: usize) -> Result<Vec<ColumnType>> {
    match directives.get("types") {
        Some(spec) if !spec.is_empty() => {
            let types = spec
                .split(':')
                .map(ColumnType::from_code)
                .collect::<Result<Vec<_>>>()?;
            if types.len() != arity {
                return Err(Error::parse(format!(
                    "types directive lists {} columns, relation has {}",
                    types.len(),
                    arity
                )));
            }
            Ok(types)
        }
        _ => Ok(vec![ColumnType::Signed; arity]),
    }
}

fn delimiter(directives: &DirectiveMap) -> String {
    directives
        .get("delimiter")
        .cloned()
        .unwrap_or_else(|| "\t".to_string())
}

/// Loads tuples into a relation.
pub trait TupleReader {
    fn read_into(&mut self, relation: &Relation) -> Result<usize>;
}

/// Drains a relation to a sink.
pub trait TupleWriter {
    fn write_all(&mut self, relation: &Relation) -> Result<()>;
}

/// A transport registered under an `IO` directive key.
pub trait IoProvider: Send + Sync {
    fn reader(
        &self,
        directives: &DirectiveMap,
        symbols: Arc<SymbolTable>,
        records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleReader>>;

    fn writer(
        &self,
        directives: &DirectiveMap,
        symbols: Arc<SymbolTable>,
        records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleWriter>>;
}

/// Directive-keyed provider lookup.
pub struct IoRegistry {
    providers: FxHashMap<String, Arc<dyn IoProvider>>,
}

impl IoRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        IoRegistry {
            providers: FxHashMap::default(),
        }
    }

    /// The standard transports: `file`, `stdout`, `stdoutprintsize`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("file", FileProvider);
        registry.register("stdout", StdoutProvider);
        registry.register("stdoutprintsize", PrintSizeProvider);
        registry
    }

    /// Register a provider under an `IO` key.
    pub fn register(&mut self, key: impl Into<String>, provider: impl IoProvider + 'static) {
        self.providers.insert(key.into(), Arc::new(provider));
    }

    fn provider(&self, directives: &DirectiveMap) -> Result<&Arc<dyn IoProvider>> {
        let key = match directives.get("IO") {
            Some(io) => io.as_str(),
            // printsize has no meaningful file form; everything else
            // defaults to files.
            None if directives.get("operation").map(String::as_str) == Some("printsize") => {
                "stdoutprintsize"
            }
            None => "file",
        };
        self.providers
            .get(key)
            .ok_or_else(|| Error::UnknownIoProvider(key.to_string()))
    }

    pub fn reader(
        &self,
        directives: &DirectiveMap,
        symbols: Arc<SymbolTable>,
        records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleReader>> {
        self.provider(directives)?
            .reader(directives, symbols, records)
    }

    pub fn writer(
        &self,
        directives: &DirectiveMap,
        symbols: Arc<SymbolTable>,
        records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleWriter>> {
        self.provider(directives)?
            .writer(directives, symbols, records)
    }
}

impl Default for IoRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Row codecs
// =============================================================================

fn parse_row(
    line: &str,
    line_no: usize,
    delimiter: &str,
    types: &[ColumnType],
    symbols: &SymbolTable,
) -> Result<Tuple> {
    let fields: Vec<&str> = if types.len() <= 1 {
        vec![line]
    } else {
        line.split(delimiter).collect()
    };
    if fields.len() != types.len() {
        return Err(Error::parse(format!(
            "line {line_no}: expected {} fields, got {}",
            types.len(),
            fields.len()
        )));
    }

    let mut tuple = Tuple::new();
    for (field, ty) in fields.iter().zip(types) {
        let value = match ty {
            ColumnType::Symbol => symbols.encode(field),
            ColumnType::Signed => field.trim().parse::<RamDomain>().map_err(|_| {
                Error::parse(format!("line {line_no}: invalid number '{field}'"))
            })?,
            ColumnType::Unsigned => field
                .trim()
                .parse::<RamUnsigned>()
                .map(from_unsigned)
                .map_err(|_| {
                    Error::parse(format!("line {line_no}: invalid unsigned '{field}'"))
                })?,
            ColumnType::Float => field
                .trim()
                .parse::<RamFloat>()
                .map(from_float)
                .map_err(|_| Error::parse(format!("line {line_no}: invalid float '{field}'")))?,
        };
        tuple.push(value);
    }
    Ok(tuple)
}

fn render_row(
    tuple: &Tuple,
    delimiter: &str,
    types: &[ColumnType],
    symbols: &SymbolTable,
) -> Result<String> {
    let mut fields = Vec::with_capacity(tuple.len());
    for (value, ty) in tuple.iter().zip(types) {
        fields.push(match ty {
            ColumnType::Symbol => symbols.decode(*value)?.to_string(),
            ColumnType::Signed => value.to_string(),
            ColumnType::Unsigned => as_unsigned(*value).to_string(),
            ColumnType::Float => as_float(*value).to_string(),
        });
    }
    Ok(fields.join(delimiter))
}

// =============================================================================
// File transport
// =============================================================================

/// Tab-separated files named by the `filename` directive.
pub struct FileProvider;

struct FileReader {
    filename: String,
    delimiter: String,
    types: Option<Vec<ColumnType>>,
    directives: DirectiveMap,
    symbols: Arc<SymbolTable>,
}

struct FileWriter {
    filename: String,
    delimiter: String,
    directives: DirectiveMap,
    symbols: Arc<SymbolTable>,
}

impl IoProvider for FileProvider {
    fn reader(
        &self,
        directives: &DirectiveMap,
        symbols: Arc<SymbolTable>,
        _records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleReader>> {
        let filename = directives
            .get("filename")
            .ok_or_else(|| Error::MissingDirective("filename".to_string()))?
            .clone();
        Ok(Box::new(FileReader {
            filename,
            delimiter: delimiter(directives),
            types: None,
            directives: directives.clone(),
            symbols,
        }))
    }

    fn writer(
        &self,
        directives: &DirectiveMap,
        symbols: Arc<SymbolTable>,
        _records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleWriter>> {
        let filename = directives
            .get("filename")
            .ok_or_else(|| Error::MissingDirective("filename".to_string()))?
            .clone();
        Ok(Box::new(FileWriter {
            filename,
            delimiter: delimiter(directives),
            directives: directives.clone(),
            symbols,
        }))
    }
}

impl TupleReader for FileReader {
    fn read_into(&mut self, relation: &Relation) -> Result<usize> {
        let types = match &self.types {
            Some(t) => t.clone(),
            None => {
                let t = column_types(&self.directives, relation.arity())?;
                self.types = Some(t.clone());
                t
            }
        };
        let file = File::open(&self.filename)?;
        let mut loaded = 0;
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let tuple = parse_row(&line, idx + 1, &self.delimiter, &types, &self.symbols)?;
            relation.insert(&tuple)?;
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl TupleWriter for FileWriter {
    fn write_all(&mut self, relation: &Relation) -> Result<()> {
        let types = column_types(&self.directives, relation.arity())?;
        let mut out = BufWriter::new(File::create(&self.filename)?);
        for tuple in relation.collect()? {
            writeln!(
                out,
                "{}",
                render_row(&tuple, &self.delimiter, &types, &self.symbols)?
            )?;
        }
        out.flush()?;
        Ok(())
    }
}

// =============================================================================
// Stdout transports
// =============================================================================

/// Tab-separated rows on standard output, prefixed by nothing.
pub struct StdoutProvider;

struct StdoutWriter {
    delimiter: String,
    directives: DirectiveMap,
    symbols: Arc<SymbolTable>,
}

impl IoProvider for StdoutProvider {
    fn reader(
        &self,
        _directives: &DirectiveMap,
        _symbols: Arc<SymbolTable>,
        _records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleReader>> {
        Err(Error::internal("stdout transport cannot read".to_string()))
    }

    fn writer(
        &self,
        directives: &DirectiveMap,
        symbols: Arc<SymbolTable>,
        _records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleWriter>> {
        Ok(Box::new(StdoutWriter {
            delimiter: delimiter(directives),
            directives: directives.clone(),
            symbols,
        }))
    }
}

impl TupleWriter for StdoutWriter {
    fn write_all(&mut self, relation: &Relation) -> Result<()> {
        let types = column_types(&self.directives, relation.arity())?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for tuple in relation.collect()? {
            writeln!(
                out,
                "{}",
                render_row(&tuple, &self.delimiter, &types, &self.symbols)?
            )?;
        }
        Ok(())
    }
}

/// `name<TAB>size` lines on standard output.
pub struct PrintSizeProvider;

struct PrintSizeWriter;

impl IoProvider for PrintSizeProvider {
    fn reader(
        &self,
        _directives: &DirectiveMap,
        _symbols: Arc<SymbolTable>,
        _records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleReader>> {
        Err(Error::internal("printsize transport cannot read".to_string()))
    }

    fn writer(
        &self,
        _directives: &DirectiveMap,
        _symbols: Arc<SymbolTable>,
        _records: Arc<RecordTable>,
    ) -> Result<Box<dyn TupleWriter>> {
        Ok(Box::new(PrintSizeWriter))
    }
}

impl TupleWriter for PrintSizeWriter {
    fn write_all(&mut self, relation: &Relation) -> Result<()> {
        println!("{}\t{}", relation.name(), relation.len()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tuple_from;
    use crate::ram::RelationDecl;

    fn directives(pairs: &[(&str, &str)]) -> DirectiveMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn relation(name: &str, arity: usize) -> Relation {
        Relation::create(&RelationDecl::btree(name, arity), vec![(0..arity).collect()], None)
            .unwrap()
    }

    #[test]
    fn test_column_types_default_signed() {
        let d = directives(&[]);
        assert_eq!(column_types(&d, 2).unwrap(), vec![ColumnType::Signed; 2]);
    }

    #[test]
    fn test_column_types_parse() {
        let d = directives(&[("types", "s:i:u:f")]);
        assert_eq!(
            column_types(&d, 4).unwrap(),
            vec![
                ColumnType::Symbol,
                ColumnType::Signed,
                ColumnType::Unsigned,
                ColumnType::Float
            ]
        );
        assert!(column_types(&d, 3).is_err());
        assert!(column_types(&directives(&[("types", "x")]), 1).is_err());
    }

    #[test]
    fn test_parse_and_render_row() {
        let symbols = SymbolTable::new();
        let types = vec![ColumnType::Symbol, ColumnType::Signed];
        let tuple = parse_row("hello\t42", 1, "\t", &types, &symbols).unwrap();
        assert_eq!(tuple[1], 42);
        assert_eq!(render_row(&tuple, "\t", &types, &symbols).unwrap(), "hello\t42");
    }

    #[test]
    fn test_parse_row_field_count_mismatch() {
        let symbols = SymbolTable::new();
        let types = vec![ColumnType::Signed, ColumnType::Signed];
        assert!(parse_row("1", 3, "\t", &types, &symbols).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge.facts");
        std::fs::write(&path, "1\t2\n2\t3\n\n3\t4\n").unwrap();

        let symbols = Arc::new(SymbolTable::new());
        let records = Arc::new(RecordTable::new());
        let registry = IoRegistry::with_defaults();
        let rel = relation("edge", 2);

        let d = directives(&[
            ("operation", "input"),
            ("IO", "file"),
            ("filename", path.to_str().unwrap()),
        ]);
        let mut reader = registry
            .reader(&d, Arc::clone(&symbols), Arc::clone(&records))
            .unwrap();
        assert_eq!(reader.read_into(&rel).unwrap(), 3);
        assert!(rel.contains(0, &tuple_from(&[2, 3])).unwrap());

        let out_path = dir.path().join("edge.out");
        let d = directives(&[
            ("operation", "output"),
            ("IO", "file"),
            ("filename", out_path.to_str().unwrap()),
        ]);
        let mut writer = registry.writer(&d, symbols, records).unwrap();
        writer.write_all(&rel).unwrap();

        let written = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(written, "1\t2\n2\t3\n3\t4\n");
    }

    #[test]
    fn test_symbol_columns_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("name.facts");
        std::fs::write(&path, "alice\t1\nbob\t2\n").unwrap();

        let symbols = Arc::new(SymbolTable::new());
        let records = Arc::new(RecordTable::new());
        let registry = IoRegistry::with_defaults();
        let rel = relation("name", 2);

        let d = directives(&[
            ("operation", "input"),
            ("filename", path.to_str().unwrap()),
            ("types", "s:i"),
        ]);
        registry
            .reader(&d, Arc::clone(&symbols), Arc::clone(&records))
            .unwrap()
            .read_into(&rel)
            .unwrap();

        let alice = symbols.encode("alice");
        assert!(rel.contains(0, &tuple_from(&[alice, 1])).unwrap());
    }

    #[test]
    fn test_missing_filename_is_fatal() {
        let registry = IoRegistry::with_defaults();
        let d = directives(&[("operation", "input"), ("IO", "file")]);
        let result = registry.reader(
            &d,
            Arc::new(SymbolTable::new()),
            Arc::new(RecordTable::new()),
        );
        assert!(matches!(result, Err(Error::MissingDirective(_))));
    }

    #[test]
    fn test_unknown_provider() {
        let registry = IoRegistry::with_defaults();
        let d = directives(&[("operation", "input"), ("IO", "carrier-pigeon")]);
        let result = registry.reader(
            &d,
            Arc::new(SymbolTable::new()),
            Arc::new(RecordTable::new()),
        );
        assert!(matches!(result, Err(Error::UnknownIoProvider(_))));
    }
}
