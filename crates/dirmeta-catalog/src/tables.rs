//! Persisted table layout of the catalog on top of the KV store.
//!
//! Key formats:
//! - `field/{name}`: registry row (bincode `FieldDef`)
//! - `table/{name}`: marker for a field's indexed table (storage type)
//! - `fv/{name}/{dir_be}`: one value per directory and field
//! - `param/{dir_be}/{key}\0{seq_be}`: non-indexed parameter rows
//! - `set/{name}`: metadata set record
//! - `seq/{name}`: id sequences
//!
//! Field names are validated identifiers before they reach this module,
//! so they can be embedded in keys without escaping.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};
use crate::kvstore::{BatchOp, KvStore};
use crate::types::{DirId, FieldDef, MetaValue, SetId};

const FIELD_PREFIX: &[u8] = b"field/";
const TABLE_PREFIX: &[u8] = b"table/";
const VALUE_PREFIX: &[u8] = b"fv/";
const PARAM_PREFIX: &[u8] = b"param/";
const SET_PREFIX: &[u8] = b"set/";
const SEQ_PREFIX: &[u8] = b"seq/";

/// Sequence used for field ids.
pub const FIELD_SEQ: &str = "field";
/// Sequence used for set ids.
pub const SET_SEQ: &str = "set";
const PARAM_SEQ: &str = "param";

fn named_key(prefix: &[u8], name: &str) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

fn value_prefix(field: &str) -> Vec<u8> {
    let mut key = named_key(VALUE_PREFIX, field);
    key.push(b'/');
    key
}

fn value_key(field: &str, dir: DirId) -> Vec<u8> {
    let mut key = value_prefix(field);
    key.extend_from_slice(&dir.as_u64().to_be_bytes());
    key
}

fn param_dir_prefix(dir: DirId) -> Vec<u8> {
    let mut key = PARAM_PREFIX.to_vec();
    key.extend_from_slice(&dir.as_u64().to_be_bytes());
    key.push(b'/');
    key
}

fn param_key(dir: DirId, name: &str, seq: u64) -> Vec<u8> {
    let mut key = param_dir_prefix(dir);
    key.extend_from_slice(name.as_bytes());
    key.push(0);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn read_be_u64(bytes: &[u8]) -> CatalogResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| CatalogError::Codec(format!("malformed id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

fn decode_value_key(field: &str, key: &[u8]) -> CatalogResult<DirId> {
    let prefix_len = value_prefix(field).len();
    read_be_u64(&key[prefix_len..]).map(DirId::new)
}

fn decode_param_key(key: &[u8]) -> CatalogResult<(DirId, String, u64)> {
    let dir_start = PARAM_PREFIX.len();
    let name_start = dir_start + 9;
    if key.len() < name_start + 9 {
        return Err(CatalogError::Codec("malformed parameter key".into()));
    }
    let dir = DirId::new(read_be_u64(&key[dir_start..dir_start + 8])?);
    let seq = read_be_u64(&key[key.len() - 8..])?;
    let name = String::from_utf8(key[name_start..key.len() - 9].to_vec())
        .map_err(|e| CatalogError::Codec(e.to_string()))?;
    Ok((dir, name, seq))
}

/// A stored non-indexed parameter row.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterRow {
    /// Directory the parameter is attached to.
    pub dir: DirId,
    /// Parameter key.
    pub key: String,
    /// Insertion sequence, increasing over time.
    pub seq: u64,
    /// Stored value.
    pub value: MetaValue,
}

/// Stored metadata set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetRecord {
    /// Set identifier.
    pub id: SetId,
    /// Set name.
    pub name: String,
    /// Field to value assignments.
    pub entries: BTreeMap<String, MetaValue>,
}

/// Typed access to the catalog tables.
pub struct TableStore {
    kv: Arc<dyn KvStore>,
    seq_lock: Mutex<()>,
}

impl TableStore {
    /// Creates a table store over the given KV backend.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            seq_lock: Mutex::new(()),
        }
    }

    /// Applies a batch atomically.
    pub fn commit(&self, ops: Vec<BatchOp>) -> CatalogResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.kv.write_batch(ops)
    }

    /// Allocates the next id of a sequence, starting at 1.
    pub fn next_id(&self, seq: &str) -> CatalogResult<u64> {
        let _guard = self.seq_lock.lock();
        let key = named_key(SEQ_PREFIX, seq);
        let current = match self.kv.get(&key)? {
            Some(raw) => read_be_u64(&raw)?,
            None => 0,
        };
        let next = current + 1;
        self.kv.put(key, next.to_be_bytes().to_vec())?;
        Ok(next)
    }

    // Registry

    /// Loads every registered field, ordered by name.
    pub fn load_fields(&self) -> CatalogResult<Vec<FieldDef>> {
        self.kv
            .scan_prefix(FIELD_PREFIX)?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(CatalogError::from))
            .collect()
    }

    /// Loads one registered field.
    pub fn load_field(&self, name: &str) -> CatalogResult<Option<FieldDef>> {
        match self.kv.get(&named_key(FIELD_PREFIX, name))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Creates the indexed table for a field together with its registry row.
    pub fn create_indexed_table(&self, def: &FieldDef, storage_type: &str) -> CatalogResult<()> {
        let table_key = named_key(TABLE_PREFIX, &def.name);
        if self.kv.contains_key(&table_key)? {
            return Err(CatalogError::Storage(format!(
                "table for field '{}' already exists",
                def.name
            )));
        }
        self.commit(vec![
            BatchOp::Put {
                key: table_key,
                value: bincode::serialize(storage_type)?,
            },
            BatchOp::Put {
                key: named_key(FIELD_PREFIX, &def.name),
                value: bincode::serialize(def)?,
            },
        ])
    }

    /// Returns true if the field's indexed table exists.
    pub fn table_exists(&self, field: &str) -> CatalogResult<bool> {
        self.kv.contains_key(&named_key(TABLE_PREFIX, field))
    }

    /// Drops the field's table, its rows and its registry row in one batch.
    /// Returns the number of value rows dropped.
    pub fn drop_table(&self, field: &str) -> CatalogResult<usize> {
        let rows = self.kv.scan_prefix(&value_prefix(field))?.len();
        self.commit(vec![
            BatchOp::DeletePrefix {
                prefix: value_prefix(field),
            },
            BatchOp::Delete {
                key: named_key(TABLE_PREFIX, field),
            },
            BatchOp::Delete {
                key: named_key(FIELD_PREFIX, field),
            },
        ])?;
        Ok(rows)
    }

    fn require_table(&self, field: &str) -> CatalogResult<()> {
        if self.table_exists(field)? {
            Ok(())
        } else {
            Err(CatalogError::Storage(format!(
                "table for field '{}' does not exist",
                field
            )))
        }
    }

    // Indexed values

    /// Builds the upsert for a directory's own value of a field.
    pub fn upsert_op(&self, field: &str, dir: DirId, value: &MetaValue) -> CatalogResult<BatchOp> {
        Ok(BatchOp::Put {
            key: value_key(field, dir),
            value: bincode::serialize(value)?,
        })
    }

    /// Inserts or overwrites a directory's own value of a field.
    pub fn upsert_value(&self, field: &str, dir: DirId, value: &MetaValue) -> CatalogResult<()> {
        self.require_table(field)?;
        self.commit(vec![self.upsert_op(field, dir, value)?])
    }

    /// Returns the stored rows of a field, optionally restricted to some
    /// directories.
    pub fn select_values(
        &self,
        field: &str,
        dirs: Option<&BTreeSet<DirId>>,
    ) -> CatalogResult<Vec<(DirId, MetaValue)>> {
        self.require_table(field)?;
        match dirs {
            Some(dirs) => {
                let mut rows = Vec::new();
                for dir in dirs {
                    if let Some(raw) = self.kv.get(&value_key(field, *dir))? {
                        rows.push((*dir, bincode::deserialize(&raw)?));
                    }
                }
                Ok(rows)
            }
            None => self
                .kv
                .scan_prefix(&value_prefix(field))?
                .into_iter()
                .map(|(key, raw)| Ok((decode_value_key(field, &key)?, bincode::deserialize(&raw)?)))
                .collect(),
        }
    }

    /// Returns the directories whose own value of the field satisfies `matches`.
    pub fn select_dirs<F>(&self, field: &str, matches: F) -> CatalogResult<BTreeSet<DirId>>
    where
        F: Fn(&MetaValue) -> bool,
    {
        Ok(self
            .select_values(field, None)?
            .into_iter()
            .filter(|(_, value)| matches(value))
            .map(|(dir, _)| dir)
            .collect())
    }

    /// Returns the sorted distinct values of a field.
    pub fn distinct_values(
        &self,
        field: &str,
        dirs: Option<&BTreeSet<DirId>>,
    ) -> CatalogResult<Vec<MetaValue>> {
        let mut values: Vec<MetaValue> = self
            .select_values(field, dirs)?
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        Ok(values)
    }

    /// Deletes a field's rows for the given directories.
    pub fn delete_values(&self, field: &str, dirs: &BTreeSet<DirId>) -> CatalogResult<usize> {
        let present = self.select_values(field, Some(dirs))?;
        let ops = present
            .iter()
            .map(|(dir, _)| BatchOp::Delete {
                key: value_key(field, *dir),
            })
            .collect();
        self.commit(ops)?;
        Ok(present.len())
    }

    // Parameters

    /// Builds the append of a parameter row.
    pub fn append_parameter_op(
        &self,
        dir: DirId,
        key: &str,
        value: &MetaValue,
    ) -> CatalogResult<BatchOp> {
        let seq = self.next_id(PARAM_SEQ)?;
        Ok(BatchOp::Put {
            key: param_key(dir, key, seq),
            value: bincode::serialize(value)?,
        })
    }

    /// Returns the parameter rows of the given directories.
    pub fn select_parameters(&self, dirs: &[DirId]) -> CatalogResult<Vec<ParameterRow>> {
        let mut rows = Vec::new();
        for dir in dirs {
            for (key, raw) in self.kv.scan_prefix(&param_dir_prefix(*dir))? {
                let (dir, name, seq) = decode_param_key(&key)?;
                rows.push(ParameterRow {
                    dir,
                    key: name,
                    seq,
                    value: bincode::deserialize(&raw)?,
                });
            }
        }
        rows.sort_by_key(|row| row.seq);
        Ok(rows)
    }

    /// Returns every parameter row stored under `key`, oldest first.
    pub fn parameter_rows_for_key(&self, key: &str) -> CatalogResult<Vec<ParameterRow>> {
        let mut rows = Vec::new();
        for (raw_key, raw) in self.kv.scan_prefix(PARAM_PREFIX)? {
            let (dir, name, seq) = decode_param_key(&raw_key)?;
            if name == key {
                rows.push(ParameterRow {
                    dir,
                    key: name,
                    seq,
                    value: bincode::deserialize(&raw)?,
                });
            }
        }
        rows.sort_by_key(|row| row.seq);
        Ok(rows)
    }

    /// Builds deletes for the given parameter rows.
    pub fn delete_parameter_ops(&self, rows: &[ParameterRow]) -> Vec<BatchOp> {
        rows.iter()
            .map(|row| BatchOp::Delete {
                key: param_key(row.dir, &row.key, row.seq),
            })
            .collect()
    }

    /// Deletes every parameter row of the given directories.
    pub fn delete_parameters_for_dirs(&self, dirs: &BTreeSet<DirId>) -> CatalogResult<usize> {
        let ids: Vec<DirId> = dirs.iter().copied().collect();
        let rows = self.select_parameters(&ids)?;
        self.commit(self.delete_parameter_ops(&rows))?;
        Ok(rows.len())
    }

    // Metadata sets

    /// Stores a new metadata set record.
    pub fn insert_set(&self, record: &SetRecord) -> CatalogResult<()> {
        self.kv
            .put(named_key(SET_PREFIX, &record.name), bincode::serialize(record)?)
    }

    /// Loads a metadata set record.
    pub fn load_set(&self, name: &str) -> CatalogResult<Option<SetRecord>> {
        match self.kv.get(&named_key(SET_PREFIX, name))? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Loads every metadata set record, ordered by name.
    pub fn load_sets(&self) -> CatalogResult<Vec<SetRecord>> {
        self.kv
            .scan_prefix(SET_PREFIX)?
            .into_iter()
            .map(|(_, raw)| bincode::deserialize(&raw).map_err(CatalogError::from))
            .collect()
    }

    /// Deletes a metadata set record. Returns false if it did not exist.
    pub fn delete_set(&self, name: &str) -> CatalogResult<bool> {
        let key = named_key(SET_PREFIX, name);
        if !self.kv.contains_key(&key)? {
            return Ok(false);
        }
        self.kv.delete(&key)?;
        Ok(true)
    }
}
