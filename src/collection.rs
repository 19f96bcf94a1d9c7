//! In-memory state of one collection: rows keyed by primary key, brute-force
//! similarity search, filtered queries and deletes.

use crate::distance::MetricType;
use crate::entity::{Entity, FieldValue, Hit, Row};
use crate::error::{Result, VectorDbError};
use crate::filter::Filter;
use crate::schema::{validate_collection_name, CollectionInfo, CollectionSchema, DataType};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Largest `limit` a search accepts.
pub const MAX_SEARCH_LIMIT: usize = 16384;

/// Output field name selecting every stored field plus the vector.
pub const ALL_FIELDS: &str = "*";

/// A stored row without its key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub vector: Vector,
    pub fields: BTreeMap<String, FieldValue>,
}

/// A validated collection and its rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    name: String,
    schema: CollectionSchema,
    pk: String,
    vector_field: String,
    dim: usize,
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

impl Collection {
    /// Create an empty collection after validating its name and schema.
    pub fn new(name: &str, schema: CollectionSchema) -> Result<Self> {
        validate_collection_name(name)?;
        schema.validate()?;
        let (pk, vector_field, dim) = match (schema.primary_field(), schema.vector_field()) {
            (Some(pk), Some(vf)) => match vf.data_type {
                DataType::FloatVector { dim } => (pk.name.clone(), vf.name.clone(), dim),
                _ => return Err(VectorDbError::schema("vector field is not a FloatVector")),
            },
            _ => return Err(VectorDbError::schema("schema lacks primary key or vector field")),
        };

        Ok(Self {
            name: name.to_string(),
            schema,
            pk,
            vector_field,
            dim,
            rows: BTreeMap::new(),
            next_id: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn primary_key(&self) -> &str {
        &self.pk
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> MetricType {
        self.schema.metric
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn info(&self) -> CollectionInfo {
        CollectionInfo {
            name: self.name.clone(),
            schema: self.schema.clone(),
            row_count: self.rows.len(),
        }
    }

    /// Validate a batch and resolve its primary keys without touching
    /// stored rows. Either every entity is accepted or the batch fails.
    pub fn prepare_insert(&self, entities: Vec<Entity>) -> Result<Vec<(i64, Record)>> {
        let auto_id = self.schema.auto_id();
        let mut batch_ids = HashSet::new();
        let mut next_id = self.next_id;
        let mut prepared = Vec::with_capacity(entities.len());

        for entity in entities {
            let id = match (auto_id, entity.id) {
                (true, Some(_)) => {
                    return Err(VectorDbError::schema(format!(
                        "primary key `{}` is auto-generated and must not be supplied",
                        self.pk
                    )));
                }
                (true, None) => {
                    let id = next_id;
                    next_id = id.checked_add(1).ok_or_else(|| {
                        VectorDbError::schema(format!(
                            "auto-generated primary keys exhausted for `{}`",
                            self.name
                        ))
                    })?;
                    id
                }
                (false, Some(id)) => id,
                (false, None) => {
                    return Err(VectorDbError::schema(format!(
                        "missing primary key `{}`",
                        self.pk
                    )));
                }
            };

            if self.rows.contains_key(&id) || !batch_ids.insert(id) {
                return Err(VectorDbError::DuplicateKey {
                    collection: self.name.clone(),
                    id,
                });
            }

            entity.vector.validate(self.dim)?;
            if self.metric() == MetricType::Cosine && entity.vector.norm() == 0.0 {
                return Err(VectorDbError::InvalidVector {
                    reason: "zero vector cannot be ranked by cosine similarity".to_string(),
                });
            }
            self.check_fields(&entity.fields)?;

            prepared.push((
                id,
                Record {
                    vector: entity.vector,
                    fields: entity.fields,
                },
            ));
        }

        Ok(prepared)
    }

    fn check_fields(&self, fields: &BTreeMap<String, FieldValue>) -> Result<()> {
        for (name, value) in fields {
            if name == &self.pk || name == &self.vector_field {
                return Err(VectorDbError::schema(format!(
                    "field `{}` must be given as the entity id or vector",
                    name
                )));
            }
            match self.schema.field(name) {
                Some(declared) => check_type(name, declared.data_type, value)?,
                None if self.schema.enable_dynamic_field => {}
                None => {
                    return Err(VectorDbError::schema(format!(
                        "field `{}` is not declared and dynamic fields are disabled",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Store rows produced by [`Collection::prepare_insert`] (or replayed
    /// from the log).
    pub fn apply_insert(&mut self, rows: Vec<(i64, Record)>) {
        for (id, record) in rows {
            // Saturates at i64::MAX; auto ids then fail before reaching the log
            if id >= self.next_id {
                self.next_id = id.saturating_add(1);
            }
            self.rows.insert(id, record);
        }
    }

    /// Insert a batch, returning the primary keys in input order.
    pub fn insert(&mut self, entities: Vec<Entity>) -> Result<Vec<i64>> {
        let rows = self.prepare_insert(entities)?;
        let ids = rows.iter().map(|(id, _)| *id).collect();
        self.apply_insert(rows);
        Ok(ids)
    }

    /// Ids of rows matching a filter, ascending.
    pub fn matching_ids(&self, filter: &Filter) -> Vec<i64> {
        self.rows
            .iter()
            .filter(|(id, record)| filter.matches(&self.pk, **id, &record.fields))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Remove the given ids; absent ids are ignored. Returns the number removed.
    pub fn delete_ids(&mut self, ids: &[i64]) -> usize {
        ids.iter().filter(|id| self.rows.remove(*id).is_some()).count()
    }

    /// k-NN search for each query vector among rows passing `filter`.
    ///
    /// The filter is applied before ranking, so each result list holds
    /// `min(limit, matching rows)` hits ordered by descending score, ties
    /// broken by ascending id.
    pub fn search(
        &self,
        queries: &[Vector],
        limit: usize,
        output_fields: &[String],
        filter: &Filter,
    ) -> Result<Vec<Vec<Hit>>> {
        if limit == 0 || limit > MAX_SEARCH_LIMIT {
            return Err(VectorDbError::backend(format!(
                "limit must be between 1 and {}, got {}",
                MAX_SEARCH_LIMIT, limit
            )));
        }
        for query in queries {
            query.validate(self.dim)?;
        }

        let candidates: Vec<(i64, &Record)> = self
            .rows
            .iter()
            .filter(|(id, record)| filter.matches(&self.pk, **id, &record.fields))
            .map(|(id, record)| (*id, record))
            .collect();

        let metric = self.metric();
        queries
            .iter()
            .map(|query| -> Result<Vec<Hit>> {
                let mut scored: Vec<(i64, f32)> = candidates
                    .iter()
                    .map(|(id, record)| Ok((*id, metric.score(query, &record.vector)?)))
                    .collect::<Result<Vec<_>>>()?;

                scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
                scored.truncate(limit);

                Ok(scored
                    .into_iter()
                    .filter_map(|(id, score)| {
                        self.project(id, output_fields)
                            .map(|entity| Hit { score, entity })
                    })
                    .collect())
            })
            .collect()
    }

    /// All rows matching `filter`, ascending by id.
    pub fn query(&self, filter: &Filter, output_fields: &[String]) -> Vec<Row> {
        self.matching_ids(filter)
            .into_iter()
            .filter_map(|id| self.project(id, output_fields))
            .collect()
    }

    /// Rows for the given ids in request order; missing and repeated ids
    /// are skipped.
    pub fn get(&self, ids: &[i64], output_fields: &[String]) -> Vec<Row> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.project(*id, output_fields))
            .collect()
    }

    fn project(&self, id: i64, output_fields: &[String]) -> Option<Row> {
        let record = self.rows.get(&id)?;
        let all = output_fields.iter().any(|f| f == ALL_FIELDS);
        let wants = |name: &str| all || output_fields.iter().any(|f| f == name);

        Some(Row {
            id,
            vector: wants(self.vector_field.as_str()).then(|| record.vector.clone()),
            fields: record
                .fields
                .iter()
                .filter(|(name, _)| wants(name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        })
    }
}

fn check_type(name: &str, data_type: DataType, value: &FieldValue) -> Result<()> {
    let ok = match (data_type, value) {
        (DataType::Bool, FieldValue::Bool(_)) => true,
        (DataType::Int64, FieldValue::Int(_)) => true,
        (DataType::Float, FieldValue::Float(_) | FieldValue::Int(_)) => true,
        (DataType::VarChar { max_length }, FieldValue::Str(s)) => {
            if s.len() > max_length {
                return Err(VectorDbError::schema(format!(
                    "value of `{}` exceeds max_length {}",
                    name, max_length
                )));
            }
            true
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(VectorDbError::schema(format!(
            "value {} does not match the declared type of `{}`",
            value, name
        )))
    }
}
