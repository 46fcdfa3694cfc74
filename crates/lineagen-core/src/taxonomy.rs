//! Static constraint tables for lineage synthesis.
//!
//! Two lookups drive every other component: which asset types a data-source
//! kind may host, and which relationship types may connect an ordered pair of
//! asset types. Both are built once and consulted read-only.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Category of system hosting assets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    Warehouse,
    Database,
    Transformation,
    Orchestration,
    Bi,
    Streaming,
    ObjectStorage,
}

impl DataSourceKind {
    pub const ALL: [DataSourceKind; 7] = [
        DataSourceKind::Warehouse,
        DataSourceKind::Database,
        DataSourceKind::Transformation,
        DataSourceKind::Orchestration,
        DataSourceKind::Bi,
        DataSourceKind::Streaming,
        DataSourceKind::ObjectStorage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceKind::Warehouse => "warehouse",
            DataSourceKind::Database => "database",
            DataSourceKind::Transformation => "transformation",
            DataSourceKind::Orchestration => "orchestration",
            DataSourceKind::Bi => "bi",
            DataSourceKind::Streaming => "streaming",
            DataSourceKind::ObjectStorage => "object_storage",
        }
    }

    /// Platforms of this kind, in declaration order.
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        Platform::ALL
            .into_iter()
            .filter(move |platform| platform.kind() == *self)
    }
}

/// Concrete system an asset lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Snowflake,
    Bigquery,
    Redshift,
    Postgres,
    Mysql,
    Arangodb,
    Dbt,
    Airflow,
    Tableau,
    Looker,
    Powerbi,
    Kafka,
    S3,
}

impl Platform {
    pub const ALL: [Platform; 13] = [
        Platform::Snowflake,
        Platform::Bigquery,
        Platform::Redshift,
        Platform::Postgres,
        Platform::Mysql,
        Platform::Arangodb,
        Platform::Dbt,
        Platform::Airflow,
        Platform::Tableau,
        Platform::Looker,
        Platform::Powerbi,
        Platform::Kafka,
        Platform::S3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Snowflake => "snowflake",
            Platform::Bigquery => "bigquery",
            Platform::Redshift => "redshift",
            Platform::Postgres => "postgres",
            Platform::Mysql => "mysql",
            Platform::Arangodb => "arangodb",
            Platform::Dbt => "dbt",
            Platform::Airflow => "airflow",
            Platform::Tableau => "tableau",
            Platform::Looker => "looker",
            Platform::Powerbi => "powerbi",
            Platform::Kafka => "kafka",
            Platform::S3 => "s3",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Snowflake => "Snowflake",
            Platform::Bigquery => "BigQuery",
            Platform::Redshift => "Redshift",
            Platform::Postgres => "PostgreSQL",
            Platform::Mysql => "MySQL",
            Platform::Arangodb => "ArangoDB",
            Platform::Dbt => "dbt",
            Platform::Airflow => "Airflow",
            Platform::Tableau => "Tableau",
            Platform::Looker => "Looker",
            Platform::Powerbi => "Power BI",
            Platform::Kafka => "Kafka",
            Platform::S3 => "S3",
        }
    }

    pub fn kind(&self) -> DataSourceKind {
        match self {
            Platform::Snowflake | Platform::Bigquery | Platform::Redshift => {
                DataSourceKind::Warehouse
            }
            Platform::Postgres | Platform::Mysql | Platform::Arangodb => DataSourceKind::Database,
            Platform::Dbt => DataSourceKind::Transformation,
            Platform::Airflow => DataSourceKind::Orchestration,
            Platform::Tableau | Platform::Looker | Platform::Powerbi => DataSourceKind::Bi,
            Platform::Kafka => DataSourceKind::Streaming,
            Platform::S3 => DataSourceKind::ObjectStorage,
        }
    }
}

/// Kind of data object. Carries no behavior beyond being a constraint key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Schema,
    Table,
    View,
    Column,
    Model,
    Source,
    Workflow,
    Job,
    Dashboard,
    Report,
    Metric,
    Dimension,
    Measure,
    Topic,
    Bucket,
}

impl AssetType {
    pub const ALL: [AssetType; 15] = [
        AssetType::Schema,
        AssetType::Table,
        AssetType::View,
        AssetType::Column,
        AssetType::Model,
        AssetType::Source,
        AssetType::Workflow,
        AssetType::Job,
        AssetType::Dashboard,
        AssetType::Report,
        AssetType::Metric,
        AssetType::Dimension,
        AssetType::Measure,
        AssetType::Topic,
        AssetType::Bucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Schema => "schema",
            AssetType::Table => "table",
            AssetType::View => "view",
            AssetType::Column => "column",
            AssetType::Model => "model",
            AssetType::Source => "source",
            AssetType::Workflow => "workflow",
            AssetType::Job => "job",
            AssetType::Dashboard => "dashboard",
            AssetType::Report => "report",
            AssetType::Metric => "metric",
            AssetType::Dimension => "dimension",
            AssetType::Measure => "measure",
            AssetType::Topic => "topic",
            AssetType::Bucket => "bucket",
        }
    }

    /// Column-like assets that take part in field-level lineage.
    pub fn is_field_level(&self) -> bool {
        matches!(
            self,
            AssetType::Column | AssetType::Dimension | AssetType::Measure | AssetType::Metric
        )
    }
}

/// Semantic label on an edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    SourceToTarget,
    ParentChild,
    DependsOn,
    Produces,
    Consumes,
    Joins,
    Includes,
    References,
    Runs,
    Populates,
    Aggregates,
    Filters,
    Transforms,
    Enriches,
    FieldLineage,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 15] = [
        RelationshipType::SourceToTarget,
        RelationshipType::ParentChild,
        RelationshipType::DependsOn,
        RelationshipType::Produces,
        RelationshipType::Consumes,
        RelationshipType::Joins,
        RelationshipType::Includes,
        RelationshipType::References,
        RelationshipType::Runs,
        RelationshipType::Populates,
        RelationshipType::Aggregates,
        RelationshipType::Filters,
        RelationshipType::Transforms,
        RelationshipType::Enriches,
        RelationshipType::FieldLineage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::SourceToTarget => "source_to_target",
            RelationshipType::ParentChild => "parent_child",
            RelationshipType::DependsOn => "depends_on",
            RelationshipType::Produces => "produces",
            RelationshipType::Consumes => "consumes",
            RelationshipType::Joins => "joins",
            RelationshipType::Includes => "includes",
            RelationshipType::References => "references",
            RelationshipType::Runs => "runs",
            RelationshipType::Populates => "populates",
            RelationshipType::Aggregates => "aggregates",
            RelationshipType::Filters => "filters",
            RelationshipType::Transforms => "transforms",
            RelationshipType::Enriches => "enriches",
            RelationshipType::FieldLineage => "field_lineage",
        }
    }
}

macro_rules! impl_taxonomy_key {
    ($ty:ty, $label:literal) => {
        impl FromStr for $ty {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                <$ty>::ALL
                    .into_iter()
                    .find(|item| item.as_str() == value)
                    .ok_or_else(|| Error::Configuration(format!("unknown {} '{value}'", $label)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_taxonomy_key!(DataSourceKind, "data source kind");
impl_taxonomy_key!(Platform, "platform");
impl_taxonomy_key!(AssetType, "asset type");
impl_taxonomy_key!(RelationshipType, "relationship type");

use AssetType as A;
use DataSourceKind as K;
use RelationshipType as R;

const WAREHOUSE_ASSETS: &[AssetType] = &[A::Schema, A::Table, A::View, A::Column];
const SOURCE_ASSETS: &[(DataSourceKind, &[AssetType])] = &[
    (K::Warehouse, WAREHOUSE_ASSETS),
    (K::Database, WAREHOUSE_ASSETS),
    (K::Transformation, &[A::Model, A::Source, A::Column]),
    (K::Orchestration, &[A::Workflow, A::Job]),
    (
        K::Bi,
        &[A::Dashboard, A::Report, A::Metric, A::Dimension, A::Measure],
    ),
    (K::Streaming, &[A::Topic, A::Schema]),
    (K::ObjectStorage, &[A::Bucket]),
];

const RELATIONSHIPS: &[(AssetType, AssetType, &[RelationshipType])] = &[
    // hierarchy
    (A::Table, A::Column, &[R::ParentChild]),
    (A::View, A::Column, &[R::ParentChild]),
    (A::Model, A::Column, &[R::ParentChild]),
    (A::Source, A::Column, &[R::ParentChild]),
    (A::Dashboard, A::Report, &[R::ParentChild]),
    (A::Dashboard, A::Metric, &[R::Includes]),
    (A::Report, A::Metric, &[R::ParentChild]),
    (A::Report, A::Dimension, &[R::ParentChild]),
    (A::Report, A::Measure, &[R::ParentChild]),
    (A::Workflow, A::Job, &[R::ParentChild]),
    (A::Schema, A::Table, &[R::ParentChild]),
    (A::Schema, A::View, &[R::ParentChild]),
    // data flow
    (
        A::Table,
        A::Table,
        &[R::SourceToTarget, R::DependsOn, R::References, R::Joins],
    ),
    (A::Table, A::View, &[R::SourceToTarget, R::References]),
    (A::Table, A::Model, &[R::SourceToTarget, R::References]),
    (
        A::View,
        A::View,
        &[R::SourceToTarget, R::DependsOn, R::References],
    ),
    (A::View, A::Model, &[R::SourceToTarget, R::References]),
    (
        A::Model,
        A::Model,
        &[R::SourceToTarget, R::DependsOn, R::References, R::Joins],
    ),
    (A::Model, A::Table, &[R::Produces, R::Populates]),
    (A::Table, A::Report, &[R::SourceToTarget]),
    (A::View, A::Report, &[R::SourceToTarget]),
    (A::Model, A::Report, &[R::SourceToTarget]),
    (A::Source, A::Model, &[R::SourceToTarget]),
    (A::Table, A::Source, &[R::SourceToTarget]),
    // field level
    (
        A::Column,
        A::Column,
        &[
            R::SourceToTarget,
            R::References,
            R::Transforms,
            R::Aggregates,
            R::Filters,
            R::Enriches,
            R::FieldLineage,
        ],
    ),
    (
        A::Column,
        A::Metric,
        &[R::SourceToTarget, R::References, R::Aggregates, R::FieldLineage],
    ),
    (A::Column, A::Dimension, &[R::FieldLineage, R::SourceToTarget]),
    (A::Column, A::Measure, &[R::FieldLineage, R::Aggregates]),
    // jobs
    (
        A::Job,
        A::Table,
        &[R::Produces, R::Consumes, R::Transforms, R::Populates],
    ),
    (A::Job, A::View, &[R::Produces, R::Transforms]),
    (A::Job, A::Model, &[R::Produces, R::Transforms, R::Runs]),
    (A::Job, A::Job, &[R::DependsOn, R::Runs]),
    (A::Job, A::Topic, &[R::Produces, R::Consumes]),
    (A::Job, A::Bucket, &[R::Produces, R::Consumes]),
    // streaming and storage
    (A::Topic, A::Table, &[R::Populates, R::SourceToTarget]),
    (A::Topic, A::Model, &[R::SourceToTarget]),
    (A::Topic, A::Job, &[R::Consumes]),
    (A::Topic, A::Schema, &[R::References]),
    (A::Bucket, A::Table, &[R::Populates, R::SourceToTarget]),
    (A::Bucket, A::Job, &[R::Consumes]),
    (A::Table, A::Topic, &[R::Produces]),
    (A::Table, A::Bucket, &[R::Produces]),
    // bi
    (A::Table, A::Dashboard, &[R::SourceToTarget]),
    (A::View, A::Dashboard, &[R::SourceToTarget]),
    (A::Model, A::Dashboard, &[R::SourceToTarget]),
];

/// Serializable taxonomy description, keyed by plain strings so unknown keys
/// surface as configuration errors instead of parse failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaxonomySpec {
    /// Data-source kind to permitted asset types.
    pub source_assets: BTreeMap<String, Vec<String>>,
    /// Permitted relationships per ordered asset-type pair.
    #[serde(default)]
    pub relationships: Vec<RelationshipRule>,
}

/// One entry of the relationship table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipRule {
    pub source: String,
    pub target: String,
    pub relationships: Vec<String>,
}

/// Read-only lookup structure for asset and relationship constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    source_assets: BTreeMap<DataSourceKind, Vec<AssetType>>,
    relationships: BTreeMap<(AssetType, AssetType), Vec<RelationshipType>>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Taxonomy {
    /// The built-in lineage taxonomy.
    pub fn builtin() -> Self {
        let source_assets = SOURCE_ASSETS
            .iter()
            .map(|(kind, assets)| (*kind, assets.to_vec()))
            .collect();
        let relationships = RELATIONSHIPS
            .iter()
            .map(|(source, target, rels)| ((*source, *target), rels.to_vec()))
            .collect();
        Self {
            source_assets,
            relationships,
        }
    }

    /// Build a taxonomy from a config-supplied description.
    pub fn from_spec(spec: &TaxonomySpec) -> Result<Self> {
        if spec.source_assets.is_empty() {
            return Err(Error::Configuration(
                "taxonomy must declare at least one data source kind".to_string(),
            ));
        }

        let mut source_assets = BTreeMap::new();
        for (kind, assets) in &spec.source_assets {
            let kind: DataSourceKind = kind.parse()?;
            if assets.is_empty() {
                return Err(Error::Configuration(format!(
                    "data source kind '{kind}' has no asset types"
                )));
            }
            let mut parsed = Vec::with_capacity(assets.len());
            for asset in assets {
                let asset: AssetType = asset.parse()?;
                if !parsed.contains(&asset) {
                    parsed.push(asset);
                }
            }
            source_assets.insert(kind, parsed);
        }

        let mut relationships: BTreeMap<(AssetType, AssetType), Vec<RelationshipType>> =
            BTreeMap::new();
        for rule in &spec.relationships {
            let source: AssetType = rule.source.parse()?;
            let target: AssetType = rule.target.parse()?;
            if rule.relationships.is_empty() {
                return Err(Error::Configuration(format!(
                    "relationship rule {source} -> {target} has no relationship types"
                )));
            }
            let entry = relationships.entry((source, target)).or_default();
            for rel in &rule.relationships {
                let rel: RelationshipType = rel.parse()?;
                if !entry.contains(&rel) {
                    entry.push(rel);
                }
            }
        }

        Ok(Self {
            source_assets,
            relationships,
        })
    }

    /// Describe this taxonomy in its serializable form.
    pub fn to_spec(&self) -> TaxonomySpec {
        TaxonomySpec {
            source_assets: self
                .source_assets
                .iter()
                .map(|(kind, assets)| {
                    (
                        kind.to_string(),
                        assets.iter().map(|asset| asset.to_string()).collect(),
                    )
                })
                .collect(),
            relationships: self
                .relationships
                .iter()
                .map(|((source, target), rels)| RelationshipRule {
                    source: source.to_string(),
                    target: target.to_string(),
                    relationships: rels.iter().map(|rel| rel.to_string()).collect(),
                })
                .collect(),
        }
    }

    /// Asset types a data-source kind may host. Never empty.
    pub fn allowed_asset_types(&self, kind: DataSourceKind) -> Result<&[AssetType]> {
        self.source_assets
            .get(&kind)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                Error::Configuration(format!("data source kind '{kind}' is not in the taxonomy"))
            })
    }

    /// Relationship types permitted from `source` to `target`; empty when the
    /// ordered pair cannot be connected.
    pub fn allowed_relationships(
        &self,
        source: AssetType,
        target: AssetType,
    ) -> &[RelationshipType] {
        self.relationships
            .get(&(source, target))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_valid_asset(&self, kind: DataSourceKind, asset: AssetType) -> bool {
        self.source_assets
            .get(&kind)
            .is_some_and(|assets| assets.contains(&asset))
    }

    pub fn is_valid_relationship(
        &self,
        source: AssetType,
        target: AssetType,
        relationship: RelationshipType,
    ) -> bool {
        self.allowed_relationships(source, target)
            .contains(&relationship)
    }

    /// Kinds present in the taxonomy.
    pub fn source_kinds(&self) -> impl Iterator<Item = DataSourceKind> + '_ {
        self.source_assets.keys().copied()
    }

    /// Kinds able to host `asset`.
    pub fn kinds_for_asset(&self, asset: AssetType) -> Vec<DataSourceKind> {
        self.source_assets
            .iter()
            .filter(|(_, assets)| assets.contains(&asset))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Ordered asset-type pairs with at least one permitted relationship.
    pub fn compatible_pairs(
        &self,
    ) -> impl Iterator<Item = (AssetType, AssetType, &[RelationshipType])> + '_ {
        self.relationships
            .iter()
            .filter(|(_, rels)| !rels.is_empty())
            .map(|((source, target), rels)| (*source, *target, rels.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_kind_hosts_assets() {
        let taxonomy = Taxonomy::builtin();
        for kind in DataSourceKind::ALL {
            let assets = taxonomy.allowed_asset_types(kind).expect("kind present");
            assert!(!assets.is_empty(), "{kind} has no assets");
        }
    }

    #[test]
    fn every_platform_kind_is_in_the_taxonomy() {
        let taxonomy = Taxonomy::builtin();
        for platform in Platform::ALL {
            assert!(taxonomy.allowed_asset_types(platform.kind()).is_ok());
        }
        assert_eq!(DataSourceKind::Bi.platforms().count(), 3);
    }

    #[test]
    fn relationship_lookup_is_directional() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(
            taxonomy.allowed_relationships(AssetType::Table, AssetType::Column),
            &[RelationshipType::ParentChild]
        );
        assert!(
            taxonomy
                .allowed_relationships(AssetType::Column, AssetType::Table)
                .is_empty()
        );
        assert!(taxonomy.is_valid_relationship(
            AssetType::Column,
            AssetType::Measure,
            RelationshipType::FieldLineage
        ));
    }

    #[test]
    fn spec_round_trip_preserves_tables() {
        let taxonomy = Taxonomy::builtin();
        let rebuilt = Taxonomy::from_spec(&taxonomy.to_spec()).expect("rebuild");
        assert_eq!(taxonomy, rebuilt);
    }

    #[test]
    fn unknown_keys_are_configuration_errors() {
        let mut spec = Taxonomy::builtin().to_spec();
        spec.source_assets
            .insert("mainframe".to_string(), vec!["table".to_string()]);
        let err = Taxonomy::from_spec(&spec).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let mut spec = Taxonomy::builtin().to_spec();
        spec.relationships.push(RelationshipRule {
            source: "table".to_string(),
            target: "table".to_string(),
            relationships: vec!["teleports".to_string()],
        });
        assert!(matches!(
            Taxonomy::from_spec(&spec),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn empty_asset_list_is_rejected() {
        let mut spec = Taxonomy::builtin().to_spec();
        spec.source_assets.insert("bi".to_string(), Vec::new());
        assert!(matches!(
            Taxonomy::from_spec(&spec),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn missing_kind_fails_lookup() {
        let mut spec = Taxonomy::builtin().to_spec();
        spec.source_assets.remove("streaming");
        let taxonomy = Taxonomy::from_spec(&spec).expect("valid subset");
        assert!(matches!(
            taxonomy.allowed_asset_types(DataSourceKind::Streaming),
            Err(Error::Configuration(_))
        ));
    }
}
