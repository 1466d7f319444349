//! Link verification write-back, for single prospects and whole projects.

use linkhunter_shared::{Project, Prospect, ProspectStatus, Result};
use linkhunter_storage::{LinkStatusUpdate, Storage};
use linkhunter_verifier::{LinkVerification, LinkVerifier};
use serde::Serialize;
use tracing::{info, instrument};

/// Verify one prospect's link to `target_url` and store the outcome.
///
/// A fetch error moves the prospect to `verification_error`; otherwise the
/// status is left alone.
pub async fn check_and_record(
    prospect: &Prospect,
    target_url: &str,
    storage: &Storage,
    verifier: &LinkVerifier,
) -> Result<LinkVerification> {
    let verification = verifier.verify(prospect, target_url).await;

    let update = LinkStatusUpdate {
        link_live: verification.link_live,
        link_url: verification.link_url.clone(),
        verified_at: verification.verified_at,
        lost_at: verification.link_lost_at,
        status: verification
            .error
            .is_some()
            .then_some(ProspectStatus::VerificationError),
    };
    storage
        .record_link_status(&prospect.id, &prospect.org_id, &update)
        .await?;

    Ok(verification)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkMonitorReport {
    pub checked: usize,
    pub live: usize,
    /// Pages fetched fine but no longer linking.
    pub lost: usize,
    /// Pages that could not be fetched.
    pub errors: usize,
}

/// Re-verify every won link of a project.
#[instrument(skip_all, fields(project_id = %project.id))]
pub async fn verify_project_links(
    project: &Project,
    storage: &Storage,
    verifier: &LinkVerifier,
) -> Result<LinkMonitorReport> {
    let won = storage
        .list_prospects(&project.id, &project.org_id, Some(ProspectStatus::Won))
        .await?;

    let mut report = LinkMonitorReport::default();
    for prospect in &won {
        let verification = check_and_record(prospect, &project.target_url, storage, verifier).await?;
        report.checked += 1;
        if verification.link_live {
            report.live += 1;
        } else if verification.error.is_some() {
            report.errors += 1;
        } else {
            report.lost += 1;
        }
    }

    info!(
        checked = report.checked,
        live = report.live,
        lost = report.lost,
        errors = report.errors,
        "link monitor run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::seeded_storage;
    use linkhunter_shared::{EntryMethod, NewProspect};
    use linkhunter_verifier::VerifierOptions;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_verifier() -> LinkVerifier {
        LinkVerifier::new(&VerifierOptions {
            timeout_secs: 5,
            allow_private_hosts: true,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn project_run_counts_live_lost_and_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><a href="https://acme.co.uk/services">Acme</a></body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body>nothing</body></html>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (storage, org, project) = seeded_storage().await;
        let new: Vec<NewProspect> = ["live", "gone", "broken"]
            .iter()
            .map(|p| {
                let url = format!("{}/{p}", server.uri());
                NewProspect::bare(&url, &format!("{p}.test"), EntryMethod::Manual)
            })
            .collect();
        let created = storage.insert_prospects(&project.id, &org.id, &new).await.unwrap();
        for p in &created {
            storage
                .set_prospect_status(&p.id, &org.id, ProspectStatus::Won, None, None)
                .await
                .unwrap();
        }

        let report = verify_project_links(&project, &storage, &local_verifier())
            .await
            .unwrap();
        assert_eq!(
            report,
            LinkMonitorReport { checked: 3, live: 1, lost: 1, errors: 1 }
        );

        let live = storage.get_prospect(&created[0].id, &org.id).await.unwrap().unwrap();
        assert!(live.link_live);
        assert!(live.link_verified_at.is_some());
        assert_eq!(live.status, ProspectStatus::Won);

        let broken = storage.get_prospect(&created[2].id, &org.id).await.unwrap().unwrap();
        assert!(!broken.link_live);
        assert_eq!(broken.status, ProspectStatus::VerificationError);
    }

    #[tokio::test]
    async fn lost_link_is_stamped_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>no links</p>"))
            .mount(&server)
            .await;

        let (storage, org, project) = seeded_storage().await;
        let url = format!("{}/page", server.uri());
        let created = storage
            .insert_prospects(
                &project.id,
                &org.id,
                &[NewProspect::bare(&url, "page.test", EntryMethod::Manual)],
            )
            .await
            .unwrap();
        let verifier = local_verifier();

        let mut prospect = created[0].clone();
        prospect.link_live = true;
        let first = check_and_record(&prospect, &project.target_url, &storage, &verifier)
            .await
            .unwrap();
        let lost_at = first.link_lost_at.expect("lost timestamp stamped");

        let stored = storage.get_prospect(&prospect.id, &org.id).await.unwrap().unwrap();
        let second = check_and_record(&stored, &project.target_url, &storage, &verifier)
            .await
            .unwrap();
        assert!(!second.link_live);
        assert_eq!(
            second.link_lost_at.map(|t| t.timestamp()),
            Some(lost_at.timestamp())
        );
    }
}
