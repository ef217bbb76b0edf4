pub const SAMPLE_CSV: &str = r#"apiVersion: operators.coreos.com/v1alpha1
kind: ClusterServiceVersion
metadata:
  name: serverless-operator.v1.24.0
spec:
  install:
    strategy: deployment
    spec:
      deployments:
        - name: knative-operator
          spec:
            template:
              spec:
                containers:
                  - name: knative-operator
                    image: quay.io/foo/bar:v1
                initContainers:
                  - name: setup
                    image: quay.io/foo/setup:v3
  relatedImages:
    - name: baz
      image: quay.io/foo/baz:v2
    - name: bar
      image: quay.io/foo/bar:v1
"#;

pub const DIGEST_A: &str =
    "sha256:1111111111111111111111111111111111111111111111111111111111111111";
pub const DIGEST_B: &str =
    "sha256:2222222222222222222222222222222222222222222222222222222222222222";
pub const DIGEST_C: &str =
    "sha256:3333333333333333333333333333333333333333333333333333333333333333";
