use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, Container, EnvVar, LocalObjectReference, PodDNSConfig, PodSecurityContext, Probe,
    ResourceRequirements, SecurityContext, Toleration, Volume, VolumeMount,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Mattermost is the Schema for the mattermosts API.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "installation.mattermost.com",
    version = "v1beta1",
    kind = "Mattermost",
    shortname = "mm",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MattermostSpec {
    /// Image defines the Mattermost Docker image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Version defines the Mattermost Docker image version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Replicas defines the number of replicas to use for the Mattermost app servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Optional environment variables to set in the Mattermost application pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mattermost_env: Option<Vec<EnvVar>>,

    /// LicenseSecret is the name of the secret containing a Mattermost license.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_secret: Option<String>,

    /// IngressName defines the host to be used when creating the ingress rules.
    /// Deprecated: Use Spec.Ingress.Host instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_name: Option<String>,

    /// IngressAnnotations defines annotations passed to the Ingress associated with Mattermost.
    /// Deprecated: Use Spec.Ingress.Annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_annotations: Option<BTreeMap<String, String>>,

    /// UseIngressTLS specifies whether TLS secret should be configured for Ingress.
    /// Deprecated: Use Spec.Ingress.TLSSecret.
    #[serde(
        default,
        rename = "useIngressTLS",
        skip_serializing_if = "Option::is_none"
    )]
    pub use_ingress_tls: Option<bool>,

    /// Ingress defines configuration for Ingress resource created by the Operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Ingress>,

    /// AWSLoadBalancerController defines configuration for an ALB based ingress.
    #[serde(
        default,
        rename = "awsLoadBalancerController",
        skip_serializing_if = "Option::is_none"
    )]
    pub aws_load_balancer_controller: Option<AwsLoadBalancerController>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_service_load_balancer: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_annotations: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_labels: Option<BTreeMap<String, String>>,

    /// Specify Mattermost deployment pull policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Specify Mattermost image pull secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,

    /// Defines the DNS parameters for the Mattermost pods, in addition to those generated
    /// from DNSPolicy.
    #[serde(
        default,
        rename = "dnsConfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub dns_config: Option<PodDNSConfig>,

    /// Defines the DNS policy for the Mattermost pods.
    #[serde(
        default,
        rename = "dnsPolicy",
        skip_serializing_if = "Option::is_none"
    )]
    pub dns_policy: Option<String>,

    /// External Services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<Database>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_store: Option<FileStore>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_search: Option<ElasticSearch>,

    /// Scheduling defines the configuration related to scheduling of the Mattermost pods as
    /// well as resource constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<Scheduling>,

    /// Probes defines configuration of liveness and readiness probe for Mattermost pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probes: Option<Probes>,

    /// PodTemplate defines configuration for the template for Mattermost pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplate>,

    /// DeploymentTemplate defines configuration for the template for Mattermost deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_template: Option<DeploymentTemplate>,

    /// UpdateJob defines configuration for the template for the update job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_job: Option<UpdateJob>,

    /// PodExtensions specify custom extensions for Mattermost pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_extensions: Option<PodExtensions>,

    /// Volumes allows for mounting volumes from various sources into the Mattermost
    /// application pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Volume>>,

    /// Defines additional volumeMounts to add to Mattermost application pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mounts: Option<Vec<VolumeMount>>,

    /// ResourcePatch specifies JSON patches that can be applied to resources created by
    /// Mattermost Operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_patch: Option<ResourcePatch>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    /// Enabled determines whether the Operator should create Ingress resource or not.
    /// Disabling ingress on existing installation will cause Operator to remove it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Host defines the Ingress host to be used when creating the ingress rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Hosts allows specifying additional domain names for Mattermost to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<IngressHost>>,

    /// Annotations defines annotations passed to the Ingress associated with Mattermost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// TLSSecret specifies secret used for configuring TLS for Ingress. If empty TLS will not
    /// be configured.
    #[serde(
        default,
        rename = "tlsSecret",
        skip_serializing_if = "Option::is_none"
    )]
    pub tls_secret: Option<String>,

    /// IngressClass will be set on Ingress resource to associate it with specified
    /// IngressClass resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class: Option<String>,
}

/// IngressHost specifies additional domain names for Mattermost.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressHost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsLoadBalancerController {
    /// An AWS ALB Ingress will be created instead of nginx
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Certificate arn for the ALB, required if SSL enabled
    #[serde(
        default,
        rename = "certificateARN",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_arn: Option<String>,

    /// Whether the Ingress will be internetfacing, default is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet_facing: Option<bool>,

    /// Hosts allows specifying additional domain names for Mattermost to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<IngressHost>>,

    /// IngressClassName for your ingresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,

    /// Annotations defines annotations passed to the Ingress associated with Mattermost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Database defines the database configuration for Mattermost.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalDatabase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_managed: Option<OperatorManagedDatabase>,

    /// DisableReadinessCheck instructs Operator to not add init container responsible for
    /// checking DB access. Can be used to define custom readiness checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_readiness_check: Option<bool>,
}

/// ExternalDatabase defines the configuration of an external database.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDatabase {
    /// Secret contains data necessary to connect to the external database. The Kubernetes
    /// Secret should contain at least the 'DB_CONNECTION_STRING' key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// OperatorManagedDatabase defines the configuration of a database managed by the Kubernetes
/// Operator.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorManagedDatabase {
    /// Defines the type of database to use for an Operator-Managed database.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub database_type: Option<String>,

    /// Defines the storage size for the database. ie 50Gi
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(regex(pattern = r"^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$"))]
    pub storage_size: Option<String>,

    /// Defines the number of database replicas. For redundancy use at least 2 replicas.
    /// Setting this will override the number of replicas set by 'Size'.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Defines the resource requests and limits for the database pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Defines the database version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Defines the AWS S3 bucket where the Database Backup is stored. The operator will
    /// download the file to restore the data.
    #[serde(
        default,
        rename = "initBucketURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub init_bucket_url: Option<String>,

    /// Defines the interval for backups in cron expression format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<String>,

    /// Defines the object storage url for uploading backups.
    #[serde(
        default,
        rename = "backupURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub backup_url: Option<String>,

    /// Defines the backup retention policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_remote_delete_policy: Option<String>,

    /// Defines the secret to be used for uploading/restoring backup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_secret_name: Option<String>,

    /// Defines the secret to be used when performing a database restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_restore_secret_name: Option<String>,
}

/// FileStore defines the file store configuration for Mattermost.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalFileStore>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_volume: Option<ExternalVolumeFileStore>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_managed: Option<OperatorManagedMinio>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalFileStore>,
}

/// ExternalFileStore defines the configuration of an external file store.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalFileStore {
    /// Set to use an external MinIO deployment or S3.
    #[serde(default, rename = "url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Set to the bucket name of your external MinIO or S3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Optionally enter the name of already existing secret. Secret should have two values:
    /// "accesskey" and "secretkey".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Optionally use service account with IAM role to access AWS services, like S3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_service_account: Option<bool>,
}

/// ExternalVolumeFileStore defines the configuration of an externally managed volume file
/// store.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalVolumeFileStore {
    /// Set to the name of the pre-provisioned PersistentVolumeClaim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_name: Option<String>,
}

/// OperatorManagedMinio defines the configuration of a MinIO deployment managed by the
/// Kubernetes Operator.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorManagedMinio {
    /// Defines the storage size for MinIO. ie 50Gi
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(regex(pattern = r"^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$"))]
    pub storage_size: Option<String>,

    /// Defines the number of MinIO replicas. Supply 1 to run Minio in standalone mode with
    /// no redundancy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Defines the resource requests and limits for the MinIO pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// LocalFileStore defines the configuration of the local file store.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileStore {
    /// Set to use local (PVC) storage, require explicit enabled to prevent accidental
    /// misconfiguration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Defines the storage size for the PVC. (default 50Gi)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(regex(pattern = r"^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$"))]
    pub storage_size: Option<String>,
}

/// ElasticSearch defines the ElasticSearch configuration for Mattermost.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticSearch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Scheduling defines the configuration related to scheduling of the Mattermost pods as well
/// as resource constraints.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    /// Defines the resource requests and limits for the Mattermost app server pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// NodeSelector is a selector which must be true for the pod to fit on a node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// If specified, affinity will define the pod's scheduling constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Defines tolerations for the Mattermost app server pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,
}

/// Probes defines configuration of liveness and readiness probe for Mattermost pods.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Probes {
    /// Defines the probe to check if the application is up and running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<Probe>,

    /// Defines the probe to check if the application is ready to accept traffic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<Probe>,
}

/// PodTemplate defines configuration for the template for Mattermost pods.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    /// Defines the security context for the Mattermost app server pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,

    /// Defines the security context for the Mattermost app server container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_security_context: Option<SecurityContext>,

    /// Defines annotations to add to the Mattermost app server pods. Overrides of default
    /// prometheus annotations are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_annotations: Option<BTreeMap<String, String>>,

    /// Defines labels to add to the Mattermost app server pods. Overrides of default labels
    /// are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_labels: Option<BTreeMap<String, String>>,
}

/// DeploymentTemplate defines configuration for the template for Mattermost deployment.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTemplate {
    /// Defines the revision history limit for the mattermost deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,
}

/// UpdateJob defines configuration for the template for the update job.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJob {
    /// Determines whether to run the update job when the image changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    /// Defines annotations to add to the update job pod.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_annotations: Option<BTreeMap<String, String>>,

    /// Defines labels to add to the update job pod.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_labels: Option<BTreeMap<String, String>>,
}

/// PodExtensions specify custom extensions for Mattermost pods.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodExtensions {
    /// Additional InitContainers injected into pods. The setting does not override
    /// InitContainers defined by the Operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_containers: Option<Vec<Container>>,

    /// Additional sidecar containers injected into pods. The setting does not override any
    /// sidecar containers defined by the Operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar_containers: Option<Vec<Container>>,
}

/// ResourcePatch allows defining a custom patch to resources.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Patch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Patch>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

#[cfg(test)]
mod tests {
    use kube::Resource;

    use super::*;

    #[test]
    fn resource_identity() {
        assert_eq!(
            Mattermost::api_version(&()),
            "installation.mattermost.com/v1beta1"
        );
        assert_eq!(Mattermost::kind(&()), "Mattermost");
        assert_eq!(Mattermost::plural(&()), "mattermosts");
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let spec = MattermostSpec {
            replicas: Some(2),
            ingress: Some(Ingress {
                enabled: Some(true),
                ..Ingress::default()
            }),
            ..MattermostSpec::default()
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "replicas": 2, "ingress": { "enabled": true } })
        );
    }

    #[test]
    fn acronym_fields_keep_their_wire_names() {
        let spec: MattermostSpec = serde_json::from_value(serde_json::json!({
            "useIngressTLS": true,
            "awsLoadBalancerController": { "certificateARN": "arn:aws:acm:eu-west-1:1:cert/x" },
            "database": { "operatorManaged": { "type": "postgres", "backupURL": "s3://b" } },
        }))
        .unwrap();

        assert_eq!(spec.use_ingress_tls, Some(true));
        assert_eq!(
            spec.database
                .and_then(|db| db.operator_managed)
                .and_then(|db| db.backup_url)
                .as_deref(),
            Some("s3://b")
        );
    }
}
