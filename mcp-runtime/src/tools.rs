use serde_json::{Map, Value, json};

use crate::args::{BoundArgs, ToolArgs, bind};
use crate::client::{ApiRequest, HttpMethod, ServiceClient};
use crate::error::SmmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    /// JSON Schema type name.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
            ParamKind::Array => "array",
        }
    }
}

/// Where a bound argument ends up in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Next `{placeholder}` of the path template.
    Path,
    Query(&'static str),
    /// The whole JSON body.
    Body,
    /// One field of a JSON object body.
    BodyField(&'static str),
    /// Select the collection entry whose field equals the argument.
    Filter(&'static str),
}

#[derive(Debug)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub slot: Slot,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub method: HttpMethod,
    pub path: &'static str,
    pub params: &'static [Param],
}

impl ToolSpec {
    pub fn is_mutating(&self) -> bool {
        !self.method.is_safe()
    }

    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.as_str(),
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// One dispatcher request from validated arguments.
    pub fn request(&self, bound: &BoundArgs<'_>) -> ApiRequest {
        let mut request = ApiRequest::new(self.name, self.method, self.path);
        let mut fields = Map::new();

        for param in self.params {
            if param.slot == Slot::Path {
                // Required, so bind() already guaranteed a value.
                let value = bound.get(param.name).map(scalar_text).unwrap_or_default();
                request = request.path_arg(value);
            }
        }
        for (param, value) in &bound.values {
            match param.slot {
                Slot::Query(key) => request = request.query(key, scalar_text(value)),
                Slot::Body => request = request.body(value.clone()),
                Slot::BodyField(key) => {
                    fields.insert(key.to_string(), value.clone());
                }
                Slot::Path | Slot::Filter(_) => {}
            }
        }
        if !fields.is_empty() {
            request = request.body(Value::Object(fields));
        }
        request
    }

    fn filter(&self) -> Option<&'static str> {
        self.params.iter().find_map(|param| match param.slot {
            Slot::Filter(field) => Some(field),
            _ => None,
        })
    }
}

/// Name-indexed view over the static tool catalog.
#[derive(Debug, Clone, Copy)]
pub struct ToolRegistry {
    tools: &'static [ToolSpec],
}

impl ToolRegistry {
    pub fn standard() -> Self {
        Self { tools: CATALOG }
    }

    pub fn get(&self, name: &str) -> Option<&'static ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Mutating tools are hidden from read-only listings.
    pub fn list(&self, read_only: bool) -> impl Iterator<Item = &'static ToolSpec> {
        self.tools
            .iter()
            .filter(move |tool| !(read_only && tool.is_mutating()))
    }

    pub fn definitions(&self, read_only: bool) -> Vec<Value> {
        self.list(read_only).map(ToolSpec::definition).collect()
    }

    pub async fn call(
        &self,
        client: &ServiceClient,
        name: &str,
        args: ToolArgs,
    ) -> Result<Value, SmmError> {
        let spec = self
            .get(name)
            .ok_or_else(|| SmmError::UnknownTool(name.to_string()))?;
        let bound = bind(spec, args)?;
        let request = spec.request(&bound);
        let path = request
            .resolved_path()
            .unwrap_or_else(|_| spec.path.to_string());

        let data = client.invoke(request).await?;

        match spec.filter() {
            Some(field) => {
                let wanted = spec
                    .params
                    .iter()
                    .find(|param| param.slot == Slot::Filter(field))
                    .and_then(|param| bound.get(param.name))
                    .cloned()
                    .unwrap_or(Value::Null);
                select_entry(data, field, &wanted).ok_or_else(|| SmmError::NotFound {
                    operation: spec.name.to_string(),
                    method: spec.method,
                    path,
                    detail: Some(format!("no entry with {field} = {}", scalar_text(&wanted))),
                })
            }
            None => Ok(data),
        }
    }
}

/// Find the entry of a collection whose `field` matches. The collection is
/// either the body itself or the first array-valued field of an object body.
fn select_entry(data: Value, field: &str, wanted: &Value) -> Option<Value> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().find_map(|(_, value)| match value {
            Value::Array(items) => Some(items),
            _ => None,
        })?,
        _ => return None,
    };
    items.into_iter().find(|item| {
        item.get(field)
            .is_some_and(|value| value == wanted || scalar_text(value) == scalar_text(wanted))
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const fn path(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::String,
        slot: Slot::Path,
        required: true,
        description,
    }
}

const fn path_int(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::Integer,
        slot: Slot::Path,
        required: true,
        description,
    }
}

const fn query(
    name: &'static str,
    key: &'static str,
    kind: ParamKind,
    description: &'static str,
) -> Param {
    Param {
        name,
        kind,
        slot: Slot::Query(key),
        required: false,
        description,
    }
}

const fn required_query(name: &'static str, key: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::String,
        slot: Slot::Query(key),
        required: true,
        description,
    }
}

const fn body(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::Object,
        slot: Slot::Body,
        required: true,
        description,
    }
}

const fn field(
    name: &'static str,
    key: &'static str,
    kind: ParamKind,
    description: &'static str,
) -> Param {
    Param {
        name,
        kind,
        slot: Slot::BodyField(key),
        required: true,
        description,
    }
}

const fn filter(
    name: &'static str,
    field: &'static str,
    kind: ParamKind,
    description: &'static str,
) -> Param {
    Param {
        name,
        kind,
        slot: Slot::Filter(field),
        required: true,
        description,
    }
}

const TOPIC: Param = path("topic_name", "Kafka topic name");
const GROUP: Param = path("group_name", "Consumer group name");
const POLICY: Param = path("policy_id", "Alert policy id");
const PLUGIN_CLASS: Param = required_query(
    "connector_plugin_class",
    "connectorPluginClass",
    "Fully qualified connector plugin class",
);
const CONNECTOR: Param = path("connector_name", "Kafka Connect connector name");

// Aggregated metrics windows use `from`/`to` epoch millis.
const DURATION: Param = query(
    "duration",
    "duration",
    ParamKind::String,
    "Time window such as LAST_ONE_HOUR or LAST_SIX_HOURS",
);
const FROM: Param = query("from_time", "from", ParamKind::Integer, "Window start, epoch millis");
const TO: Param = query("to_time", "to", ParamKind::Integer, "Window end, epoch millis");

// Latency and Connect metrics use `fromTime`/`toTime`.
const FROM_TIME: Param = query("from_time", "fromTime", ParamKind::String, "Window start");
const TO_TIME: Param = query("to_time", "toTime", ParamKind::String, "Window end");

const fn get(
    name: &'static str,
    path: &'static str,
    params: &'static [Param],
    description: &'static str,
) -> ToolSpec {
    ToolSpec {
        name,
        description,
        method: HttpMethod::Get,
        path,
        params,
    }
}

const fn write(
    name: &'static str,
    method: HttpMethod,
    path: &'static str,
    params: &'static [Param],
    description: &'static str,
) -> ToolSpec {
    ToolSpec {
        name,
        description,
        method,
        path,
        params,
    }
}

static CATALOG: &[ToolSpec] = &[
    // Brokers
    get("get_brokers", "/api/v1/admin/brokers", &[], "Get all brokers in the cluster."),
    get(
        "get_broker",
        "/api/v1/admin/brokers",
        &[filter("broker_id", "id", ParamKind::Integer, "Broker id")],
        "Get details of a specific broker.",
    ),
    // Topics
    get(
        "get_all_topic_infos",
        "/api/v1/admin/configs/topics",
        &[],
        "Get all topic information including configurations.",
    ),
    get(
        "get_topic_description",
        "/api/v1/admin/configs/topics",
        &[filter("topic_name", "resourceName", ParamKind::String, "Kafka topic name")],
        "Get detailed description of a specific topic.",
    ),
    get(
        "get_default_topic_configs",
        "/api/v1/admin/configs/default/topics",
        &[],
        "Get default topic configurations.",
    ),
    get(
        "get_topic_offsets",
        "/topicConsumption/topicOffsets/{topic_name}",
        &[TOPIC],
        "Get offset information for a topic.",
    ),
    get(
        "get_topic_content",
        "/topicConsumption/topicContent/{topic_name}",
        &[
            TOPIC,
            query("partition", "partition", ParamKind::Integer, "Partition number"),
            query("offset", "offset", ParamKind::Integer, "Start offset"),
            query("limit", "limit", ParamKind::Integer, "Maximum records to return"),
        ],
        "Get content from a topic partition.",
    ),
    write(
        "create_topics",
        HttpMethod::Post,
        "/topicMetadata/createTopics",
        &[field("topics_config", "topics", ParamKind::Array, "Topic definitions to create")],
        "Create new topics.",
    ),
    write(
        "create_partitions",
        HttpMethod::Post,
        "/topicMetadata/createPartitions/{topic_name}",
        &[
            TOPIC,
            field("partition_count", "partitionCount", ParamKind::Integer, "New total partition count"),
        ],
        "Create additional partitions for a topic.",
    ),
    write(
        "delete_topics",
        HttpMethod::Post,
        "/topicMetadata/deleteTopics",
        &[field("topic_names", "topics", ParamKind::Array, "Names of topics to delete")],
        "Delete specified topics.",
    ),
    write(
        "alter_topic_configs",
        HttpMethod::Post,
        "/resourceConfiguration/alterTopicConfigs/{topic_name}",
        &[TOPIC, body("configs", "Config keys and values to set")],
        "Alter topic configurations.",
    ),
    // Consumer groups
    get("get_consumer_groups", "/api/v1/admin/consumers", &[], "Get all consumer groups."),
    get(
        "get_consumer_group_names",
        "/consumerGroupRelatedDetails/consumerGroupNames",
        &[],
        "Get all consumer group names.",
    ),
    get(
        "get_consumer_group_info",
        "/consumerGroupRelatedDetails/consumerGroupInfo/{group_name}",
        &[GROUP],
        "Get detailed information about a consumer group.",
    ),
    get(
        "get_all_consumer_info",
        "/consumerGroupRelatedDetails/allConsumerInfo",
        &[],
        "Get information about all consumers.",
    ),
    get(
        "get_consumer_info",
        "/consumerGroupRelatedDetails/consumerInfo/{consumer_id}",
        &[path("consumer_id", "Consumer client id")],
        "Get information about a specific consumer.",
    ),
    write(
        "reset_offset",
        HttpMethod::Post,
        "/consumerGroupRelatedDetails/resetOffset/{group_name}",
        &[
            GROUP,
            field("topic_name", "topic", ParamKind::String, "Topic whose offset is reset"),
            field("partition", "partition", ParamKind::Integer, "Partition number"),
            field("offset", "offset", ParamKind::Integer, "Target offset"),
        ],
        "Reset consumer group offset.",
    ),
    // Metrics
    get(
        "get_cluster_with_broker_metrics",
        "/admin/metrics/aggregated/clusterWithBrokerMetrics",
        &[DURATION, FROM, TO],
        "Get cluster metrics including broker metrics.",
    ),
    get(
        "get_cluster_with_topic_metrics",
        "/admin/metrics/aggregated/clusterWithTopicMetrics",
        &[DURATION, FROM, TO],
        "Get cluster metrics including topic metrics.",
    ),
    get(
        "get_all_consumer_group_metrics",
        "/admin/metrics/aggregated/groups",
        &[
            DURATION,
            FROM,
            TO,
            query("state", "state", ParamKind::String, "Consumer group state filter"),
            query(
                "include_producer_metrics",
                "includeProducerMetrics",
                ParamKind::Boolean,
                "Include producer metrics",
            ),
            query(
                "include_assignments",
                "includeAssignments",
                ParamKind::Boolean,
                "Include partition assignments",
            ),
        ],
        "Get metrics for all consumer groups.",
    ),
    get(
        "get_consumer_group_metrics",
        "/admin/metrics/aggregated/groups/{group_name}",
        &[GROUP, DURATION, FROM, TO],
        "Get metrics for a specific consumer group.",
    ),
    get(
        "get_all_producer_metrics",
        "/admin/metrics/aggregated/producers",
        &[DURATION, FROM, TO],
        "Get metrics for all producers.",
    ),
    get(
        "get_producer_metrics",
        "/admin/metrics/aggregated/producers/{producer_id}",
        &[path("producer_id", "Producer client id"), DURATION, FROM, TO],
        "Get metrics for a specific producer.",
    ),
    get(
        "get_topic_metrics",
        "/topicMetrics/topicMetrics/{topic_name}",
        &[TOPIC, DURATION, FROM, TO],
        "Get metrics for a specific topic.",
    ),
    get(
        "get_topic_partition_metrics",
        "/topicMetrics/topicPartitionMetrics/{topic_name}/{partition_num}",
        &[TOPIC, path_int("partition_num", "Partition number"), DURATION, FROM, TO],
        "Get metrics for a specific topic partition.",
    ),
    // Alerts
    get(
        "get_all_alert_policies",
        "/alertPolicyOperations/allAlertPolicies",
        &[],
        "Get all alert policies.",
    ),
    get(
        "get_alert_policy",
        "/alertPolicyOperations/alertPolicy/{policy_id}",
        &[POLICY],
        "Get a specific alert policy.",
    ),
    get(
        "get_alert_policy_automata",
        "/alertPolicy/automata/{policy_id}",
        &[POLICY],
        "Get the automata backing an alert policy.",
    ),
    get(
        "get_alert_notifications",
        "/api/v1/admin/alerts/notifications",
        &[],
        "Get alert notifications.",
    ),
    get(
        "get_alert_notifications_by_entity_type",
        "/alertNotifications/alertNotificationsByEntityType/{entity_type}",
        &[path("entity_type", "Entity type such as TOPIC or CONSUMER")],
        "Get alert notifications by entity type.",
    ),
    get(
        "get_alert_notifications_by_entity_type_and_name",
        "/alertNotifications/alertNotificationsByEntityTypeAndName/{entity_type}/{entity_name}",
        &[
            path("entity_type", "Entity type such as TOPIC or CONSUMER"),
            path("entity_name", "Entity name"),
        ],
        "Get alert notifications by entity type and name.",
    ),
    write(
        "add_alert_policy",
        HttpMethod::Post,
        "/alertPolicyOperations/addAlertPolicy",
        &[body("policy_config", "Alert policy definition")],
        "Add a new alert policy.",
    ),
    write(
        "update_alert_policy",
        HttpMethod::Put,
        "/alertPolicyOperations/updateAlertPolicy/{policy_id}",
        &[POLICY, body("policy_config", "Alert policy definition")],
        "Update an existing alert policy.",
    ),
    write(
        "delete_alert_policy",
        HttpMethod::Delete,
        "/alertPolicyOperations/deleteAlertPolicy/{policy_id}",
        &[POLICY],
        "Delete an alert policy.",
    ),
    write(
        "enable_alert_policy",
        HttpMethod::Post,
        "/alertPolicyOperations/enableAlertPolicy/{policy_id}",
        &[POLICY],
        "Enable an alert policy.",
    ),
    write(
        "disable_alert_policy",
        HttpMethod::Post,
        "/alertPolicyOperations/disableAlertPolicy/{policy_id}",
        &[POLICY],
        "Disable an alert policy.",
    ),
    write(
        "mark_alert_notifications",
        HttpMethod::Post,
        "/alertNotifications/markAlertNotifications",
        &[field("notification_ids", "notificationIds", ParamKind::Array, "Notification ids")],
        "Mark alert notifications as read.",
    ),
    write(
        "unmark_alert_notifications",
        HttpMethod::Post,
        "/alertNotifications/unmarkAlertNotifications",
        &[field("notification_ids", "notificationIds", ParamKind::Array, "Notification ids")],
        "Mark alert notifications as unread.",
    ),
    // Notifiers
    get("get_notifiers", "/notifiers", &[], "Get all notifiers."),
    get(
        "get_notifier",
        "/notifiers/{notifier_id}",
        &[path("notifier_id", "Notifier id")],
        "Get a specific notifier.",
    ),
    get(
        "get_notifier_provider_configs",
        "/notifiers/providerConfigs",
        &[],
        "Get notifier provider configurations.",
    ),
    // Schema registry
    get(
        "get_schema_registry_info",
        "/schemaRegistry/schemaRegistryInfo",
        &[],
        "Get schema registry information.",
    ),
    get(
        "get_schema_meta_for_topic",
        "/schemaRegistry/schemaMetaForTopic/{topic_name}",
        &[TOPIC],
        "Get schema metadata for a topic.",
    ),
    get(
        "get_key_schema_version_infos",
        "/schemaRegistry/keySchemaVersionInfos/{topic_name}",
        &[TOPIC],
        "Get key schema versions for a topic.",
    ),
    get(
        "get_value_schema_version_infos",
        "/schemaRegistry/valueSchemaVersionInfos/{topic_name}",
        &[TOPIC],
        "Get value schema versions for a topic.",
    ),
    write(
        "register_topic_schema_meta",
        HttpMethod::Post,
        "/schemaRegistry/registerTopicSchemaMeta/{topic_name}",
        &[TOPIC, body("schema_config", "Schema metadata to register")],
        "Register schema metadata for a topic.",
    ),
    // Kafka Connect
    get("get_connectors", "/api/v1/admin/connectors", &[], "Get all connectors."),
    get(
        "get_connector",
        "/api/v1/admin/connectors/{connector_name}",
        &[CONNECTOR],
        "Get a specific connector.",
    ),
    get(
        "get_connector_config_def",
        "/kafkaConnect/connectorConfigDef/{connector_name}",
        &[CONNECTOR],
        "Get the configuration definition of a connector.",
    ),
    get(
        "get_connector_permissions",
        "/kafkaConnect/connectorPermissions/{connector_name}",
        &[CONNECTOR],
        "Get permissions for a connector.",
    ),
    get(
        "get_connect_worker_metrics",
        "/metrics/connect/workers",
        &[DURATION, FROM_TIME, TO_TIME],
        "Get Kafka Connect worker metrics.",
    ),
    get(
        "get_connector_templates",
        "/kafka-connect/connector-templates",
        &[],
        "Get available connector templates.",
    ),
    get(
        "get_connector_config_definitions",
        "/kafka-connect/connector-templates/config/definitions",
        &[PLUGIN_CLASS],
        "Get configuration definitions for a connector plugin.",
    ),
    get(
        "get_connector_config_sample",
        "/kafka-connect/connector-templates/config/sample",
        &[
            required_query("name", "name", "Connector name to fill into the sample"),
            PLUGIN_CLASS,
            required_query("version", "version", "Connector plugin version"),
        ],
        "Get a sample configuration for a connector plugin.",
    ),
    get(
        "is_connect_configured",
        "/kafka-connect/is-configured",
        &[],
        "Check whether Kafka Connect is configured.",
    ),
    get(
        "get_connector_sink_metrics",
        "/metrics/connect/sink/{connector_name}/0",
        &[CONNECTOR],
        "Get sink metrics for a connector.",
    ),
    write(
        "create_connector",
        HttpMethod::Post,
        "/kafkaConnect/createConnector",
        &[body("connector_config", "Connector definition")],
        "Create a connector.",
    ),
    write(
        "delete_connector",
        HttpMethod::Delete,
        "/kafkaConnect/deleteConnector/{connector_name}",
        &[CONNECTOR],
        "Delete a connector.",
    ),
    write(
        "configure_connector",
        HttpMethod::Post,
        "/kafkaConnect/configureConnector/{connector_name}",
        &[CONNECTOR, body("config", "Connector configuration")],
        "Configure a connector.",
    ),
    write(
        "perform_connector_action",
        HttpMethod::Post,
        "/kafka-connect/connectors/{connector_name}/{action}",
        &[CONNECTOR, path("action", "Action such as pause, resume or restart")],
        "Perform an action on a connector.",
    ),
    write(
        "validate_connector_config",
        HttpMethod::Post,
        "/kafka-connect/connector-templates/config/validate-detailed",
        &[body("config", "Connector configuration to validate")],
        "Validate a connector configuration.",
    ),
    // Lineage
    get(
        "get_topic_lineage",
        "/lineage/topicLineage/{topic_name}",
        &[TOPIC],
        "Get lineage for a topic.",
    ),
    get(
        "get_topic_partition_lineage",
        "/lineage/topicPartitionLineage/{topic_name}/{partition}",
        &[TOPIC, path_int("partition", "Partition number")],
        "Get lineage for a topic partition.",
    ),
    get(
        "get_consumer_group_lineage",
        "/lineage/consumerGroupLineage/{group_name}",
        &[GROUP],
        "Get lineage for a consumer group.",
    ),
    get(
        "get_producer_lineage",
        "/lineage/producerLineage/{producer_id}",
        &[path("producer_id", "Producer client id")],
        "Get lineage for a producer.",
    ),
    // End-to-end latency
    get(
        "get_topic_etelatency",
        "/etelatency/{topic_name}",
        &[TOPIC, DURATION, FROM_TIME, TO_TIME],
        "Get end-to-end latency for a topic.",
    ),
    get(
        "get_topic_group_etelatency",
        "/etelatency/{topic_name}/groups/{group_name}",
        &[TOPIC, GROUP, DURATION, FROM_TIME, TO_TIME],
        "Get end-to-end latency for a topic and consumer group.",
    ),
    // Replication
    get(
        "get_replication_stats",
        "/replication-stats",
        &[],
        "Get replication statistics.",
    ),
    get(
        "is_replication_configured",
        "/replication-stats/is-configured",
        &[],
        "Check whether replication is configured.",
    ),
    get(
        "get_replication_stats_by_cluster",
        "/replication-stats/topics/{source}/{target}",
        &[path("source", "Source cluster alias"), path("target", "Target cluster alias")],
        "Get replication statistics between two clusters.",
    ),
    get(
        "get_topic_replication_stats",
        "/replication-stats/topics/{source}/{target}/{topic_name}",
        &[
            path("source", "Source cluster alias"),
            path("target", "Target cluster alias"),
            TOPIC,
        ],
        "Get replication statistics for a topic between two clusters.",
    ),
    get(
        "get_topic_replication_stats_simple",
        "/replication-stats/topics/{topic_name}",
        &[TOPIC],
        "Get replication statistics for a topic across all replication flows.",
    ),
    // Access
    get(
        "get_access",
        "/authentication/access",
        &[],
        "Get the caller's access information.",
    ),
];
