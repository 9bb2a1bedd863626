//! Fastly dashboard deep links

const HISTORICAL_URL: &str =
    "https://manage.fastly.com/observability/dashboard/system/overview/historic/{service_id}?range={range}&region=all";

const REALTIME_URL: &str =
    "https://manage.fastly.com/observability/dashboard/system/overview/realtime/{service_id}?range={range}";

/// Dashboard link for a service over a range token such as "5m" or "60s"
pub fn dashboard_url(service_id: &str, range: &str, realtime: bool) -> String {
    let template = if realtime { REALTIME_URL } else { HISTORICAL_URL };
    template
        .replace("{service_id}", service_id)
        .replace("{range}", range)
}
