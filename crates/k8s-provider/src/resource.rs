//! The lifecycle of manifest resources.
//!
//! A [`Resource`] is driven by the host through Create, Read, Update and Delete. Create and
//! Update validate the configuration, render the manifest and return the complete new state,
//! or diagnostics and no state at all. Read trusts the prior state verbatim and Delete only
//! drops it; no cluster is contacted.

use std::{fmt::Debug, marker::PhantomData};

use kube::core::object::HasSpec;
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    clock::{Clock, IdGenerator, SystemClock},
    config::{self, Config},
    diag::Diagnostics,
    manifest::{Manifest, ManifestConfig},
    schema::{self, Attribute, AttributeKind, AttributePath, Schema, generate},
    state::{self, State},
    validators::{AnnotationValidator, LabelValidator, NameValidator, NamespaceValidator, Validate},
    yaml::{self, CustomResourceExt},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to generate the schema of {kind}"))]
    GenerateSchema {
        source: generate::Error,
        kind: String,
    },

    #[snafu(display("the generated schema of {kind} has no attribute {path}"))]
    MissingAttribute { kind: String, path: String },

    #[snafu(display("the generated schema of {kind} is invalid"))]
    InvalidSchema { source: schema::Error, kind: String },

    #[snafu(display("failed to decode configuration"))]
    DecodeConfig { source: config::Error },

    #[snafu(display("failed to serialize manifest"))]
    SerializeManifest { source: yaml::Error },
}

pub struct CreateRequest<'a> {
    pub config: &'a Config,
}

pub struct ReadRequest<'a> {
    pub state: &'a State,
}

pub struct UpdateRequest<'a> {
    pub config: &'a Config,
    pub prior_state: &'a State,
}

pub struct DeleteRequest<'a> {
    pub prior_state: &'a State,
}

/// The outcome of a lifecycle operation.
///
/// `state` is `None` when the resource no longer exists or when the operation failed; in the
/// latter case `diagnostics` holds at least one error.
#[derive(Debug, Default)]
pub struct Response {
    pub state: Option<State>,
    pub diagnostics: Diagnostics,
}

impl Response {
    fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }
}

/// A resource type the provider offers.
pub trait Resource: Debug + Send + Sync {
    /// The name the resource type is registered under, e.g.
    /// `k8s_installation_mattermost_com_mattermost_v1beta1` for the prefix `k8s`.
    fn type_name(&self, prefix: &str) -> String;

    fn schema(&self) -> &Schema;

    /// The `CustomResourceDefinition` of the rendered resource as YAML.
    fn crd_yaml(&self) -> Result<String, yaml::Error>;

    /// Runs the validation pass: type checks and attribute validators.
    fn validate(&self, config: &Config) -> Diagnostics {
        config.validate(self.schema())
    }

    fn create(&self, request: CreateRequest<'_>) -> Response;

    fn read(&self, request: ReadRequest<'_>) -> Response;

    fn update(&self, request: UpdateRequest<'_>) -> Response;

    fn delete(&self, request: DeleteRequest<'_>) -> Response;
}

/// Renders the custom resource `K` from configuration.
///
/// The schema is derived from `K`'s spec type, wrapped in standard metadata, and extended by the
/// computed attributes `id`, `api_version`, `kind` and `yaml`.
#[derive(Debug)]
pub struct ManifestResource<K, C = SystemClock> {
    schema: Schema,
    ids: IdGenerator<C>,
    kind: PhantomData<fn() -> K>,
}

impl<K> ManifestResource<K>
where
    K: kube::Resource<DynamicType = ()> + HasSpec,
    K::Spec: JsonSchema,
{
    pub fn try_new() -> Result<Self> {
        Self::with_clock(SystemClock)
    }
}

impl<K, C> ManifestResource<K, C>
where
    K: kube::Resource<DynamicType = ()> + HasSpec,
    K::Spec: JsonSchema,
    C: Clock,
{
    /// Like [`ManifestResource::try_new`], but ids are taken from `clock`.
    pub fn with_clock(clock: C) -> Result<Self> {
        let kind = K::kind(&()).into_owned();
        let attributes = generate::attributes_for::<ManifestConfig<K::Spec>>()
            .context(GenerateSchemaSnafu { kind: &kind })?;

        let mut schema = Schema::new(attributes).with_description(format!(
            "{kind} ({api_version}) rendered as a YAML manifest",
            api_version = K::api_version(&())
        ));

        attach_validator(&mut schema, &kind, "metadata.name", NameValidator)?;
        attach_validator(&mut schema, &kind, "metadata.namespace", NamespaceValidator)?;
        attach_validator(&mut schema, &kind, "metadata.labels", LabelValidator)?;
        attach_validator(&mut schema, &kind, "metadata.annotations", AnnotationValidator)?;

        schema.attributes.extend([
            Attribute::new(state::ID, AttributeKind::Int64)
                .computed()
                .with_description("Changes whenever the manifest is written."),
            Attribute::new(state::API_VERSION, AttributeKind::String)
                .computed()
                .with_description("The API version of the rendered resource."),
            Attribute::new(state::KIND, AttributeKind::String)
                .computed()
                .with_description("The kind of the rendered resource."),
            Attribute::new(state::YAML, AttributeKind::String)
                .computed()
                .with_description("The rendered manifest."),
        ]);

        schema.check().context(InvalidSchemaSnafu { kind: &kind })?;

        Ok(Self {
            schema,
            ids: IdGenerator::new(clock),
            kind: PhantomData,
        })
    }
}

fn attach_validator(
    schema: &mut Schema,
    kind: &str,
    path: &str,
    validator: impl Validate + 'static,
) -> Result<()> {
    schema
        .attribute_mut(&AttributePath::from_dotted(path))
        .context(MissingAttributeSnafu { kind, path })?
        .validators
        .push(std::sync::Arc::new(validator));
    Ok(())
}

impl<K, C> ManifestResource<K, C>
where
    K: kube::Resource<DynamicType = ()> + HasSpec,
    K::Spec: DeserializeOwned + Serialize,
    C: Clock,
{
    /// Validates and renders `config`, returning the complete new state or nothing.
    fn write(&self, config: &Config) -> Response {
        let mut diagnostics = config.validate(&self.schema);
        if diagnostics.has_error() {
            return Response::failed(diagnostics);
        }

        match self.render(config) {
            Ok(state) => Response {
                state: Some(state),
                diagnostics,
            },
            Err(error) => {
                diagnostics.add_error_report("Failed to render manifest", error);
                Response::failed(diagnostics)
            }
        }
    }

    fn render(&self, config: &Config) -> Result<State> {
        let manifest_config: ManifestConfig<K::Spec> =
            config.decode(&self.schema).context(DecodeConfigSnafu)?;
        let manifest = Manifest::for_resource::<K>(manifest_config);
        let yaml = manifest.render().context(SerializeManifestSnafu)?;

        let mut state = State::from_config(config);
        state.set(state::ID, self.ids.next_id());
        state.set(state::API_VERSION, manifest.api_version);
        state.set(state::KIND, manifest.kind);
        state.set(state::YAML, yaml);
        Ok(state)
    }
}

impl<K, C> Resource for ManifestResource<K, C>
where
    K: kube::Resource<DynamicType = ()> + kube::CustomResourceExt + HasSpec + Debug,
    K::Spec: DeserializeOwned + Serialize,
    C: Clock,
{
    fn type_name(&self, prefix: &str) -> String {
        format!(
            "{prefix}_{group}_{kind}_{version}",
            group = K::group(&()).replace('.', "_"),
            kind = K::kind(&()).to_lowercase(),
            version = K::version(&()),
        )
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn crd_yaml(&self) -> Result<String, yaml::Error> {
        K::crd_yaml()
    }

    fn create(&self, request: CreateRequest<'_>) -> Response {
        tracing::debug!(kind = %K::kind(&()), "creating resource");
        self.write(request.config)
    }

    fn read(&self, request: ReadRequest<'_>) -> Response {
        tracing::debug!(kind = %K::kind(&()), "reading resource");
        Response {
            state: Some(request.state.clone()),
            diagnostics: Diagnostics::new(),
        }
    }

    fn update(&self, request: UpdateRequest<'_>) -> Response {
        tracing::debug!(
            kind = %K::kind(&()),
            prior_id = ?request.prior_state.id(),
            "updating resource"
        );
        if let Some(prior_id) = request.prior_state.id() {
            self.ids.observe(prior_id);
        }
        self.write(request.config)
    }

    fn delete(&self, request: DeleteRequest<'_>) -> Response {
        tracing::debug!(
            kind = %K::kind(&()),
            prior_id = ?request.prior_state.id(),
            "deleting resource"
        );
        Response::default()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    use super::*;
    use crate::{clock::tests::FixedClock, crd::mattermost::v1beta1::Mattermost};

    type Mm = ManifestResource<Mattermost, FixedClock>;

    #[fixture]
    fn resource() -> Mm {
        ManifestResource::with_clock(FixedClock(1_700_000_000_000_000_000)).unwrap()
    }

    fn config(value: Value) -> Config {
        Config::try_from(value).unwrap()
    }

    fn scenario() -> Config {
        config(json!({
            "metadata": { "name": "mm1", "namespace": "team-a" },
            "spec": {
                "replicas": 2,
                "ingress": { "enabled": true, "host": "chat.example.com" },
            },
        }))
    }

    fn create(resource: &Mm, config: &Config) -> State {
        let response = resource.create(CreateRequest { config });
        assert!(
            !response.diagnostics.has_error(),
            "{:?}",
            response.diagnostics
        );
        response.state.unwrap()
    }

    #[rstest]
    fn type_name(resource: Mm) {
        assert_eq!(
            resource.type_name("k8s"),
            "k8s_installation_mattermost_com_mattermost_v1beta1"
        );
    }

    #[rstest]
    fn create_renders_expected_document(resource: Mm) {
        let state = create(&resource, &scenario());

        assert_eq!(
            state.yaml().unwrap(),
            indoc! {"
                apiVersion: installation.mattermost.com/v1beta1
                kind: Mattermost
                metadata:
                  name: mm1
                  namespace: team-a
                spec:
                  replicas: 2
                  ingress:
                    enabled: true
                    host: chat.example.com
            "}
        );
        assert_eq!(state.id(), Some(1_700_000_000_000_000_000));
        assert_eq!(state.get("metadata"), scenario().get("metadata"));
    }

    #[rstest]
    fn constants_are_stamped(resource: Mm) {
        let state = create(&resource, &scenario());
        assert_eq!(state.api_version(), Some("installation.mattermost.com/v1beta1"));
        assert_eq!(state.kind(), Some("Mattermost"));

        let updated = resource
            .update(UpdateRequest {
                config: &scenario(),
                prior_state: &state,
            })
            .state
            .unwrap();
        assert_eq!(updated.api_version(), Some("installation.mattermost.com/v1beta1"));
        assert_eq!(updated.kind(), Some("Mattermost"));
    }

    #[rstest]
    fn user_supplied_constants_are_rejected(resource: Mm) {
        let response = resource.create(CreateRequest {
            config: &config(json!({
                "metadata": { "name": "mm1" },
                "kind": "Something",
            })),
        });

        assert!(response.diagnostics.has_error());
        assert!(response.state.is_none());
    }

    #[rstest]
    fn successive_updates_have_increasing_ids(resource: Mm) {
        let mut state = create(&resource, &scenario());

        for _ in 0..2 {
            let updated = resource
                .update(UpdateRequest {
                    config: &scenario(),
                    prior_state: &state,
                })
                .state
                .unwrap();
            assert!(updated.id() > state.id());
            assert_eq!(updated.yaml(), state.yaml());
            state = updated;
        }
    }

    #[test]
    fn update_id_exceeds_prior_id_when_clock_is_behind() {
        let resource = Mm::with_clock(FixedClock(1_000)).unwrap();
        let mut prior = create(&resource, &scenario());
        assert_eq!(prior.id(), Some(1_000));

        // written by an earlier run whose clock was ahead
        prior.set(state::ID, 5_000);
        let updated = resource
            .update(UpdateRequest {
                config: &scenario(),
                prior_state: &prior,
            })
            .state
            .unwrap();

        assert!(updated.id().unwrap() > 5_000, "{:?}", updated.id());
    }

    #[rstest]
    fn read_returns_state_unchanged(resource: Mm) {
        let state = create(&resource, &scenario());
        let response = resource.read(ReadRequest { state: &state });

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.state, Some(state));
    }

    #[rstest]
    fn delete_drops_state(resource: Mm) {
        let state = create(&resource, &scenario());
        let response = resource.delete(DeleteRequest {
            prior_state: &state,
        });

        assert!(response.state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[rstest]
    #[case("My_Name", true)]
    #[case("my-name", false)]
    fn names_are_validated_before_create(
        resource: Mm,
        #[case] name: &str,
        #[case] rejected: bool,
    ) {
        let config = config(json!({ "metadata": { "name": name } }));
        assert_eq!(resource.validate(&config).has_error(), rejected);

        let response = resource.create(CreateRequest { config: &config });
        assert_eq!(response.state.is_none(), rejected);
    }

    #[rstest]
    fn invalid_labels_and_quantities_are_reported(resource: Mm) {
        let diagnostics = resource.validate(&config(json!({
            "metadata": { "name": "mm1", "labels": { "app": "not a label value" } },
            "spec": { "database": { "operator_managed": { "storage_size": "ten gigs" } } },
        })));

        let paths = diagnostics
            .errors()
            .filter_map(|d| d.path.as_ref().map(ToString::to_string))
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            [
                r#"metadata.labels["app"]"#,
                "spec.database.operator_managed.storage_size"
            ]
        );
    }

    #[rstest]
    fn oversized_replicas_are_rejected_before_create(resource: Mm) {
        let config = config(json!({
            "metadata": { "name": "mm1" },
            "spec": { "replicas": 3_000_000_000_u64 },
        }));

        let paths = resource
            .validate(&config)
            .errors()
            .filter_map(|d| d.path.as_ref().map(ToString::to_string))
            .collect::<Vec<_>>();
        assert_eq!(paths, ["spec.replicas"]);

        let response = resource.create(CreateRequest { config: &config });
        assert!(response.state.is_none());
        assert!(
            response
                .diagnostics
                .errors()
                .all(|d| d.summary == "Incorrect attribute value type"),
            "{:?}",
            response.diagnostics
        );
    }

    #[rstest]
    fn int_or_string_keeps_supplied_form(resource: Mm) {
        let state = create(
            &resource,
            &config(json!({
                "metadata": { "name": "mm1" },
                "spec": {
                    "probes": {
                        "liveness_probe": { "http_get": { "path": "/healthz", "port": "https" } },
                        "readiness_probe": { "http_get": { "port": 8080 } },
                    },
                },
            })),
        );

        let document: serde_yaml::Value = serde_yaml::from_str(state.yaml().unwrap()).unwrap();
        let probes = &document["spec"]["probes"];
        assert_eq!(
            probes["livenessProbe"]["httpGet"]["port"],
            serde_yaml::Value::from("https")
        );
        assert_eq!(
            probes["readinessProbe"]["httpGet"]["port"],
            serde_yaml::Value::from(8080)
        );
    }

    #[rstest]
    fn null_fields_are_omitted(resource: Mm) {
        let state = create(
            &resource,
            &config(json!({
                "metadata": { "name": "mm1", "namespace": null },
                "spec": {
                    "image": null,
                    "version": "9.11",
                    "ingress": { "enabled": null, "host": null },
                },
            })),
        );

        assert_eq!(
            state.yaml().unwrap(),
            indoc! {"
                apiVersion: installation.mattermost.com/v1beta1
                kind: Mattermost
                metadata:
                  name: mm1
                spec:
                  version: '9.11'
                  ingress: {}
            "}
        );
    }

    #[rstest]
    fn schema_exposes_snake_case_names(resource: Mm) {
        let schema = resource.schema();
        for path in [
            "spec.use_ingress_tls",
            "spec.aws_load_balancer_controller.certificate_arn",
            "spec.file_store.operator_managed.storage_size",
            "spec.probes.liveness_probe.http_get.port",
        ] {
            assert!(
                schema.attribute(&AttributePath::from_dotted(path)).is_some(),
                "{path} is missing"
            );
        }

        let id = schema.attribute(&AttributePath::from_dotted("id")).unwrap();
        assert!(id.is_computed_only());
        let name = schema
            .attribute(&AttributePath::from_dotted("metadata.name"))
            .unwrap();
        assert!(name.required);
        assert_eq!(name.validators.len(), 1);
    }
}
