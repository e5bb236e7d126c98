//! Fixed prompts for every extraction call site

use crate::model::taxonomy::{format_categories, format_tags};

/// System prompt for provider and resource extraction
pub const EXTRACTION_SYSTEM: &str = "You are an expert extraction algorithm. \
Only extract relevant information from the text. \
If you do not know the value of an attribute asked to extract, \
return null for the attribute's value.";

/// Instruction prepended to page content for resource extraction
pub const RESOURCE_INSTRUCTION: &str = "Extract any dementia caregiving-related resources with \
fields such as name, resource type, location, contact info, description, meeting time, age range, \
target audience, cost, eligibility, language, accessibility, format (virtual/in-person), and website. \
If available, include last updated date and source. If a field is not present, return null. \
Summarize long text when necessary.";

/// Instruction prepended to page content for provider extraction
pub const PROVIDER_INSTRUCTION: &str = "Extract the organization that publishes this page: its \
official name, headquarters location, and contact details.";

pub const RANKER_SYSTEM: &str = "You are an expert web analyst specializing in finding specific \
information online. Your task is to analyze the links in a webpage's markdown content. The primary \
goal is to find pages containing detailed information about resources for caregivers, people with \
dementia, or older adults (e.g., specific program details, support group schedules, financial aid \
applications, eligibility criteria, direct contact information).\n\n\
Evaluate the links based on their URL structure and link text. Identify and rank the URLs that are \
*most likely* to lead directly to this detailed resource information.\n\n\
Prioritize links with text like 'Services', 'Programs', 'Support', 'Resources', 'Grants', \
'Apply Here', 'Contact Us', 'Locations', 'Eligibility', 'Schedule', 'Care', 'Assistance'.\n\
De-prioritize or ignore generic links like 'Home', 'About Us' (unless context suggests it lists \
resources), 'News', 'Blog', 'Privacy Policy', 'Terms of Service', 'Login', 'Donate', main social \
media profile links, image/document files (.pdf, .jpg).\n\n\
Focus ONLY on URLs that appear in the page.";

pub const MERGE_SYSTEM: &str = "You are a smart data enrichment algorithm. Your task is to \
deduplicate and enrich overlapping resource entries. Each resource describes the same or related \
service but may contain missing or conflicting details. Combine the entries into a single \
comprehensive version that retains the most accurate and specific information.\n\n\
Preserve accurate fields like phone, email, descriptions, URLs and categories. Prefer more detailed \
descriptions. Remove empty or redundant values. Fill in missing fields using other entries if \
available.\n\n\
Return the merged resource inside `resources`. If unsure about a field, use null.";

pub fn resource_user(content: &str) -> String {
    format!("{}\n\n{}", RESOURCE_INSTRUCTION, content)
}

pub fn provider_user(content: &str) -> String {
    format!("{}\n\n{}", PROVIDER_INSTRUCTION, content)
}

pub fn ranker_user(content: &str, max_links: usize) -> String {
    format!(
        "Here is the page:\n{}\n\nPlease return a ranked list of the top 2-{} URLs from this \
         page that are most promising for finding detailed caregiver resource information. \
         The list should be ordered from most promising to least promising.",
        content, max_links
    )
}

pub fn category_system() -> String {
    format!(
        "You are an expert in classifying resources for caregivers, people with dementia, or \
         older adults. Given the provided content, determine the most appropriate resource \
         category and subcategory from the following list:\n\n{}\n\n\
         Return ONLY ONE category name and ONE subcategory. If none of the categories fit, \
         return null for both.",
        format_categories()
    )
}

pub fn tag_system() -> String {
    format!(
        "You are an expert in classifying resources for caregivers, people with dementia, or \
         older adults. Given the provided content, determine the most appropriate tag from the \
         following list:\n\n{}\n\nReturn ONLY ONE tag from the list. If none fit, return null.",
        format_tags()
    )
}

pub fn classify_user(content: &str) -> String {
    format!("Here is the content to classify:\n{}", content)
}

pub fn merge_user(key: &str, observations: &str, provider: &str) -> String {
    format!(
        "Here are multiple possibly overlapping resources for {} from the same provider:\n\n{}\n\n\
         The provider is: {}\n\n\
         Please return ONE merged, enriched resource that takes the best from each.",
        key, observations, provider
    )
}
