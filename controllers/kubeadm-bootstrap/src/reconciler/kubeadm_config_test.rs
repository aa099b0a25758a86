//! Unit tests for KubeadmConfig reconciler

use crate::error::{ControllerError, Severity};
use crate::metrics::ReconcileResult;
use crate::test_utils::*;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use crds::{ClusterConfiguration, File, Format, KubeadmConfigSpec};
use kubeadm_render::MockKubeadmRenderer;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn decoded_data(patch: &RecordedPatch) -> String {
    let encoded = patch.patch["status"]["bootstrapData"].as_str().unwrap();
    String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
}

#[tokio::test]
async fn test_init_spec_becomes_ready_with_ordered_payload() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), writer.clone(), TIMEOUT);
    let config = create_test_kubeadm_config("cp-0", "default", init_spec());

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    let patches = writer.patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].namespace, "default");
    assert_eq!(patches[0].name, "cp-0");
    assert_eq!(patches[0].patch["status"]["phase"], "Ready");
    assert_eq!(patches[0].patch["status"]["ready"], true);
    assert!(patches[0].patch["status"]["errorReason"].is_null());

    let data = decoded_data(&patches[0]);
    let file = data.find("/etc/a").unwrap();
    let pre = data.find("echo pre").unwrap();
    let kubeadm = data.find("kubeadm init").unwrap();
    let post = data.find("echo post").unwrap();
    assert!(file < pre && pre < kubeadm && kubeadm < post);
    assert_eq!(reconciler.metrics.count(ReconcileResult::Ready), 1);
}

#[tokio::test]
async fn test_join_spec_becomes_ready_without_init_documents() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), writer.clone(), TIMEOUT);
    let config = create_test_kubeadm_config("worker-0", "default", join_spec());

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    let patches = writer.patches();
    assert_eq!(patches[0].patch["status"]["phase"], "Ready");
    let data = decoded_data(&patches[0]);
    assert!(data.contains("kubeadm join"));
    assert!(!data.contains("ClusterConfiguration"));
    assert!(!data.contains("InitConfiguration"));
}

#[tokio::test]
async fn test_ready_is_never_rendered_or_written_again() {
    let kubeadm = MockKubeadmRenderer::new();
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(kubeadm.clone(), writer.clone(), TIMEOUT);
    let mut config = create_test_kubeadm_config("cp-0", "default", init_spec());

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();
    assert_eq!(kubeadm.calls(), 1);
    let first = writer.patches()[0].clone();
    apply_status_patch(&mut config, &first);
    let published = config.status.as_ref().unwrap().bootstrap_data.clone();

    // unchanged spec
    reconciler.reconcile_kubeadm_config(&config).await.unwrap();
    // changed spec, and one that would no longer validate
    config.spec.pre_kubeadm_commands.push("echo changed".to_string());
    reconciler.reconcile_kubeadm_config(&config).await.unwrap();
    config.spec.join_configuration = join_spec().join_configuration;
    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    assert_eq!(kubeadm.calls(), 1);
    assert_eq!(writer.patches().len(), 1);
    assert_eq!(config.status.unwrap().bootstrap_data, published);
    assert_eq!(reconciler.metrics.count(ReconcileResult::Skipped), 3);
}

#[tokio::test]
async fn test_ambiguous_spec_fails_without_rendering() {
    let kubeadm = MockKubeadmRenderer::new();
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(kubeadm.clone(), writer.clone(), TIMEOUT);
    let mut spec = init_spec();
    spec.join_configuration = join_spec().join_configuration;
    let config = create_test_kubeadm_config("both", "default", spec);

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    let patches = writer.patches();
    assert_eq!(patches[0].patch["status"]["phase"], "Failed");
    assert_eq!(patches[0].patch["status"]["errorReason"], "AmbiguousOrMissingConfiguration");
    assert_eq!(kubeadm.calls(), 0);
}

#[tokio::test]
async fn test_empty_spec_fails_as_missing() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), writer.clone(), TIMEOUT);
    let config = create_test_kubeadm_config("empty", "default", KubeadmConfigSpec::default());

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    assert_eq!(
        writer.patches()[0].patch["status"]["errorReason"],
        "AmbiguousOrMissingConfiguration"
    );
}

#[tokio::test]
async fn test_cluster_only_spec_fails_with_incomplete_pair() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), writer.clone(), TIMEOUT);
    let spec = KubeadmConfigSpec {
        cluster_configuration: Some(ClusterConfiguration::default()),
        ..Default::default()
    };
    let config = create_test_kubeadm_config("half", "default", spec);

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    let status = &writer.patches()[0].patch["status"];
    assert_eq!(status["phase"], "Failed");
    assert_eq!(status["ready"], false);
    assert_eq!(status["errorReason"], "IncompletePair");
    assert!(status["errorMessage"].as_str().unwrap().contains("initConfiguration"));
    assert_eq!(reconciler.metrics.count(ReconcileResult::Failed), 1);
}

#[tokio::test]
async fn test_unsupported_format_fails_without_data() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), writer.clone(), TIMEOUT);
    let mut spec = init_spec();
    spec.format = Some(Format::from("unsupported-format".to_string()));
    let config = create_test_kubeadm_config("fmt", "default", spec);

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    let status = &writer.patches()[0].patch["status"];
    assert_eq!(status["errorReason"], "UnsupportedFormat");
    assert!(status["bootstrapData"].is_null());
}

#[tokio::test]
async fn test_invalid_file_reports_index() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), writer.clone(), TIMEOUT);
    let mut spec = join_spec();
    spec.files = vec![
        File {
            path: "/etc/ok".to_string(),
            content: Some("ok".to_string()),
            ..Default::default()
        },
        File {
            path: String::new(),
            content: Some("x".to_string()),
            ..Default::default()
        },
    ];
    let config = create_test_kubeadm_config("files", "default", spec);

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    let status = &writer.patches()[0].patch["status"];
    assert_eq!(status["errorReason"], "InvalidFile");
    assert!(status["errorMessage"].as_str().unwrap().contains("files[1]"));
}

#[tokio::test]
async fn test_upstream_failure_is_recorded() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(
        MockKubeadmRenderer::failing("discovery is broken"),
        writer.clone(),
        TIMEOUT,
    );
    let config = create_test_kubeadm_config("worker-0", "default", join_spec());

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    let status = &writer.patches()[0].patch["status"];
    assert_eq!(status["errorReason"], "UpstreamRenderFailure");
    assert!(status["errorMessage"].as_str().unwrap().contains("discovery is broken"));
}

#[tokio::test]
async fn test_failed_with_unchanged_spec_is_skipped() {
    let kubeadm = MockKubeadmRenderer::new();
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(kubeadm.clone(), writer.clone(), TIMEOUT);
    let mut spec = init_spec();
    spec.format = Some(Format::from("ignition".to_string()));
    let mut config = create_test_kubeadm_config("cp-0", "default", spec);

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();
    let first = writer.patches()[0].clone();
    apply_status_patch(&mut config, &first);

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();
    assert_eq!(writer.patches().len(), 1);
    assert_eq!(reconciler.metrics.count(ReconcileResult::Skipped), 1);
}

#[tokio::test]
async fn test_failed_is_retried_after_spec_change() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), writer.clone(), TIMEOUT);
    let spec = KubeadmConfigSpec {
        cluster_configuration: init_spec().cluster_configuration,
        ..Default::default()
    };
    let mut config = create_test_kubeadm_config("cp-0", "default", spec);

    reconciler.reconcile_kubeadm_config(&config).await.unwrap();
    let failed = writer.patches()[0].clone();
    assert_eq!(failed.patch["status"]["phase"], "Failed");
    apply_status_patch(&mut config, &failed);

    config.spec.init_configuration = init_spec().init_configuration;
    reconciler.reconcile_kubeadm_config(&config).await.unwrap();

    let patches = writer.patches();
    assert_eq!(patches.len(), 2);
    let status = &patches[1].patch["status"];
    assert_eq!(status["phase"], "Ready");
    assert!(status["errorReason"].is_null());
    assert!(status["errorMessage"].is_null());
    assert_ne!(status["observedSpecHash"], failed.patch["status"]["observedSpecHash"]);
}

#[tokio::test]
async fn test_kubeadm_timeout_is_transient_and_not_recorded() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(
        MockKubeadmRenderer::new().with_delay(Duration::from_millis(500)),
        writer.clone(),
        Duration::from_millis(20),
    );
    let config = create_test_kubeadm_config("slow", "default", join_spec());

    let err = reconciler.reconcile_kubeadm_config(&config).await.unwrap_err();

    match err {
        ControllerError::Transient(inner) => assert_eq!(inner.severity(), Severity::Transient),
        other => panic!("expected transient error, got {other:?}"),
    }
    assert!(writer.patches().is_empty());
    assert_eq!(reconciler.metrics.count(ReconcileResult::Transient), 1);
}

#[tokio::test]
async fn test_status_write_conflict_is_returned_for_retry() {
    let reconciler = create_test_reconciler(
        MockKubeadmRenderer::new(),
        RecordingStatusWriter::conflicting(),
        TIMEOUT,
    );
    let config = create_test_kubeadm_config("cp-0", "default", init_spec());

    let err = reconciler.reconcile_kubeadm_config(&config).await.unwrap_err();
    assert!(matches!(err, ControllerError::Reconciliation(_)));
    assert_eq!(reconciler.metrics.count(ReconcileResult::Transient), 1);
    assert_eq!(reconciler.metrics.count(ReconcileResult::Ready), 0);
}

#[tokio::test]
async fn test_rendering_is_deterministic_across_objects() {
    let writer = RecordingStatusWriter::new();
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), writer.clone(), TIMEOUT);
    let first = create_test_kubeadm_config("cp-0", "default", init_spec());
    let second = create_test_kubeadm_config("cp-1", "other", init_spec());

    reconciler.reconcile_kubeadm_config(&first).await.unwrap();
    reconciler.reconcile_kubeadm_config(&second).await.unwrap();

    let patches = writer.patches();
    assert_eq!(
        patches[0].patch["status"]["bootstrapData"],
        patches[1].patch["status"]["bootstrapData"]
    );
}

#[test]
fn test_backoff_grows_per_resource_and_resets() {
    let reconciler = create_test_reconciler(MockKubeadmRenderer::new(), RecordingStatusWriter::new(), TIMEOUT);

    assert_eq!(reconciler.get_backoff_for_resource("default/a"), (1, 1));
    assert_eq!(reconciler.get_backoff_for_resource("default/a"), (1, 2));
    assert_eq!(reconciler.get_backoff_for_resource("default/a"), (2, 3));
    assert_eq!(reconciler.get_backoff_for_resource("default/b"), (1, 1));

    reconciler.reset_backoff("default/a");
    assert_eq!(reconciler.get_backoff_for_resource("default/a"), (1, 1));
}
