//! Registry lookup for the model-monitor analyzer container.

use anyhow::Result;

/// Repository name of the analyzer image in every region.
const ANALYZER_REPOSITORY: &str = "sagemaker-model-monitor-analyzer";

/// Account hosting the analyzer image, per region.
const ANALYZER_ACCOUNTS: &[(&str, &str)] = &[
    ("af-south-1", "875698925577"),
    ("ap-east-1", "001633400207"),
    ("ap-northeast-1", "574779866223"),
    ("ap-northeast-2", "709848358524"),
    ("ap-northeast-3", "990339680094"),
    ("ap-south-1", "126357580389"),
    ("ap-southeast-1", "245545462676"),
    ("ap-southeast-2", "563025443158"),
    ("ca-central-1", "536280801234"),
    ("cn-north-1", "453000072557"),
    ("cn-northwest-1", "453252182341"),
    ("eu-central-1", "048819808253"),
    ("eu-north-1", "895015795356"),
    ("eu-south-1", "933208885752"),
    ("eu-west-1", "468650794304"),
    ("eu-west-2", "749857270468"),
    ("eu-west-3", "680080141114"),
    ("me-south-1", "607024016150"),
    ("sa-east-1", "539772159869"),
    ("us-east-1", "156813124566"),
    ("us-east-2", "777275614652"),
    ("us-gov-west-1", "362178532790"),
    ("us-west-1", "890145073186"),
    ("us-west-2", "159807026194"),
];

/// Returns the analyzer image URI for `region`, unless `override_uri` is set.
///
/// # Errors
///
/// Returns an error if the region has no known analyzer image and no
/// override is given.
pub fn analyzer_image_uri(region: &str, override_uri: Option<&str>) -> Result<String> {
    if let Some(uri) = override_uri {
        return Ok(uri.to_owned());
    }

    let Some((_, account)) = ANALYZER_ACCOUNTS.iter().find(|(name, _)| *name == region) else {
        anyhow::bail!(
            "No model monitor analyzer image known for region {region}; set MONITOR_IMAGE_URI"
        );
    };

    let domain = if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    };

    Ok(format!(
        "{account}.dkr.ecr.{region}.{domain}/{ANALYZER_REPOSITORY}:latest"
    ))
}
