//! GROQ queries used by the gate, actions and page loaders.
//!
//! Every value comes in through a `$param`; nothing is formatted into the
//! query text.

/// Listing card fields shared by the catalogue views.
macro_rules! listing_card {
    () => {
        r#"_id,
    title,
    "slug": slug.current,
    price,
    bedrooms,
    bathrooms,
    squareFeet,
    address,
    "image": images[0]{ asset, alt },
    location"#
    };
}

pub const AGENT_ID_QUERY: &str =
    r#"*[_type == "agent" && userId == $userId][0]{ _id, onboardingComplete }"#;

pub const AGENT_SUMMARY_QUERY: &str =
    r#"*[_type == "agent" && userId == $userId][0]{ _id, name, onboardingComplete }"#;

pub const AGENT_BY_USER_ID_QUERY: &str = r#"*[_type == "agent" && userId == $userId][0]{
    _id,
    userId,
    name,
    email,
    onboardingComplete
}"#;

pub const AGENT_PROFILE_QUERY: &str = r#"*[_type == "agent" && userId == $userId][0]{
    _id,
    name,
    email,
    phone,
    photo,
    bio,
    licenseNumber,
    agency,
    onboardingComplete
}"#;

pub const AGENT_LISTINGS_QUERY: &str = r#"*[_type == "property" && agent._ref == $agentId] | order(createdAt desc){
    _id,
    title,
    "slug": slug.current,
    price,
    status,
    bedrooms,
    bathrooms,
    "image": images[0]{ asset, alt },
    createdAt
}"#;

pub const LISTING_BY_ID_QUERY: &str = r#"*[_type == "property" && _id == $id][0]{
    _id,
    title,
    description,
    price,
    propertyType,
    status,
    bedrooms,
    bathrooms,
    squareFeet,
    yearBuilt,
    address,
    location,
    images,
    amenities,
    agent
}"#;

pub const LISTING_OWNER_QUERY: &str =
    r#"*[_type == "property" && _id == $id][0]{ _id, _rev, agent, slug }"#;

pub const AGENT_LEADS_QUERY: &str = r#"*[_type == "lead" && agent._ref == $agentId] | order(createdAt desc){
    _id,
    buyerName,
    buyerEmail,
    buyerPhone,
    status,
    createdAt,
    property->{ _id, title, "slug": slug.current }
}"#;

pub const LEAD_OWNER_QUERY: &str = r#"*[_type == "lead" && _id == $leadId][0]{ _id, _rev, agent }"#;

pub const LEAD_EXISTS_QUERY: &str =
    r#"*[_type == "lead" && property._ref == $propertyId && buyerEmail == $email][0]{ _id }"#;

pub const PROPERTY_AGENT_QUERY: &str =
    r#"*[_type == "property" && _id == $propertyId][0]{ _id, agent }"#;

pub const USER_EXISTS_QUERY: &str = r#"*[_type == "user" && clerkId == $clerkId][0]{ _id }"#;

pub const USER_CONTACT_QUERY: &str =
    r#"*[_type == "user" && clerkId == $clerkId][0]{ _id, name, email, phone }"#;

pub const USER_PROFILE_QUERY: &str = r#"*[_type == "user" && clerkId == $clerkId][0]{
    _id,
    name,
    email,
    phone,
    createdAt
}"#;

pub const USER_SAVED_IDS_QUERY: &str =
    r#"*[_type == "user" && clerkId == $clerkId][0]{ _id, _rev, "savedIds": savedListings[]._ref }"#;

pub const USER_SAVED_LISTINGS_QUERY: &str = concat!(
    r#"*[_type == "user" && clerkId == $clerkId][0]{
  savedListings[]->{
    "#,
    listing_card!(),
    r#",
    status
  }
}.savedListings"#
);

pub const FEATURED_PROPERTIES_QUERY: &str = concat!(
    r#"*[_type == "property" && featured == true && status == "active"] | order(createdAt desc)[0...6]{
    "#,
    listing_card!(),
    "\n}"
);

const SEARCH_FILTER: &str = r#"_type == "property" && status == "active"
    && price >= $minPrice && price <= $maxPrice
    && bedrooms >= $beds && bathrooms >= $baths
    && ($type == "" || propertyType == $type)
    && ($city == "" || lower(address.city) == lower($city))"#;

pub fn properties_search_query() -> String {
    format!(
        "*[{SEARCH_FILTER}] | order(createdAt desc)[$start...$end]{{\n    {}\n}}",
        listing_card!()
    )
}

pub fn properties_count_query() -> String {
    format!("count(*[{SEARCH_FILTER}])")
}

pub const PROPERTY_DETAIL_QUERY: &str = r#"*[_type == "property" && slug.current == $slug][0]{
    _id,
    title,
    description,
    price,
    propertyType,
    status,
    bedrooms,
    bathrooms,
    squareFeet,
    yearBuilt,
    address,
    location,
    images,
    amenities,
    agent->{
        _id,
        userId,
        name,
        email,
        phone,
        photo,
        bio,
        agency
    }
}"#;

pub const DASHBOARD_COUNTS_QUERY: &str = r#"{
    "listings": count(*[_type == "property" && agent._ref == $agentId]),
    "newLeads": count(*[_type == "lead" && agent._ref == $agentId && status == "new"])
}"#;

pub const ANALYTICS_LEADS_BY_PROPERTY_QUERY: &str = r#"*[_type == "property" && agent._ref == $agentId]{
    title,
    "leads": count(*[_type == "lead" && property._ref == ^._id])
} | order(leads desc)"#;

/// Count queries issued concurrently by the analytics page, keyed by the
/// field they fill.
pub const ANALYTICS_COUNT_QUERIES: [(&str, &str); 9] = [
    ("totalListings", r#"count(*[_type == "property" && agent._ref == $agentId])"#),
    ("activeListings", r#"count(*[_type == "property" && agent._ref == $agentId && status == "active"])"#),
    ("pendingListings", r#"count(*[_type == "property" && agent._ref == $agentId && status == "pending"])"#),
    ("soldListings", r#"count(*[_type == "property" && agent._ref == $agentId && status == "sold"])"#),
    ("totalLeads", r#"count(*[_type == "lead" && agent._ref == $agentId])"#),
    ("newLeads", r#"count(*[_type == "lead" && agent._ref == $agentId && status == "new"])"#),
    ("contactedLeads", r#"count(*[_type == "lead" && agent._ref == $agentId && status == "contacted"])"#),
    ("closedLeads", r#"count(*[_type == "lead" && agent._ref == $agentId && status == "closed"])"#),
    ("featuredListings", r#"count(*[_type == "property" && agent._ref == $agentId && featured == true])"#),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_query_parses() {
        let mut queries: Vec<String> = [
            AGENT_ID_QUERY,
            AGENT_SUMMARY_QUERY,
            AGENT_BY_USER_ID_QUERY,
            AGENT_PROFILE_QUERY,
            AGENT_LISTINGS_QUERY,
            LISTING_BY_ID_QUERY,
            LISTING_OWNER_QUERY,
            AGENT_LEADS_QUERY,
            LEAD_OWNER_QUERY,
            LEAD_EXISTS_QUERY,
            PROPERTY_AGENT_QUERY,
            USER_EXISTS_QUERY,
            USER_CONTACT_QUERY,
            USER_PROFILE_QUERY,
            USER_SAVED_IDS_QUERY,
            USER_SAVED_LISTINGS_QUERY,
            FEATURED_PROPERTIES_QUERY,
            PROPERTY_DETAIL_QUERY,
            DASHBOARD_COUNTS_QUERY,
            ANALYTICS_LEADS_BY_PROPERTY_QUERY,
        ]
        .iter()
        .map(|q| q.to_string())
        .collect();
        queries.push(properties_search_query());
        queries.push(properties_count_query());
        queries.extend(ANALYTICS_COUNT_QUERIES.iter().map(|(_, q)| q.to_string()));

        for query in &queries {
            if let Err(e) = homefind_groq::parse(query) {
                panic!("query failed to parse: {e}\n{query}");
            }
        }
    }

    #[test]
    fn lookups_pin_their_type() {
        let expr = homefind_groq::parse(AGENT_ID_QUERY).unwrap();
        assert_eq!(expr.referenced_types(), vec!["agent".to_string()]);
        assert!(!expr.scans_untyped());
    }
}
