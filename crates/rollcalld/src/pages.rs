//! Server-rendered HTML for the upload form and the results view.

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem}\
img{max-width:100%;border:1px solid #ccc}\
.detected li{color:#1a7f37}.not-detected li{color:#b42318}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape_html(title),
    )
}

pub fn upload_form() -> String {
    page(
        "Attendance",
        "<h1>Attendance</h1>\n\
         <form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"image\" accept=\"image/*\" required>\n\
         <button type=\"submit\">Upload</button>\n\
         </form>\n",
    )
}

pub fn results(detected: &[String], not_detected: &[String], output_url: &str) -> String {
    let body = format!(
        "<h1>Results</h1>\n\
         <h2>Detected</h2>\n{detected}\
         <h2>Not detected</h2>\n{not_detected}\
         <h2>Annotated image</h2>\n<img src=\"{src}\" alt=\"Annotated upload\">\n\
         <p><a href=\"/\">Upload another photo</a></p>\n",
        detected = student_list("detected", detected),
        not_detected = student_list("not-detected", not_detected),
        src = escape_html(output_url),
    );
    page("Results", &body)
}

fn student_list(id: &str, students: &[String]) -> String {
    if students.is_empty() {
        return format!("<p id=\"{id}\" class=\"{id}\">None</p>\n");
    }
    let items: String = students
        .iter()
        .map(|s| format!("<li>{}</li>\n", escape_html(s)))
        .collect();
    format!("<ul id=\"{id}\" class=\"{id}\">\n{items}</ul>\n")
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode a single URL path segment (RFC 3986 unreserved chars pass through).
pub fn encode_path_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_form_posts_image_field() {
        let html = upload_form();
        assert!(html.contains("action=\"/upload\""));
        assert!(html.contains("name=\"image\""));
        assert!(html.contains("multipart/form-data"));
    }

    #[test]
    fn test_results_lists() {
        let html = results(&["alice".into()], &["bob".into(), "<carol>".into()], "/outputs/output_a.jpg");
        let (top, bottom) = html.split_once("id=\"not-detected\"").unwrap();
        assert!(top.contains("<li>alice</li>"));
        assert!(bottom.contains("<li>bob</li>"));
        assert!(bottom.contains("<li>&lt;carol&gt;</li>"));
        assert!(html.contains("src=\"/outputs/output_a.jpg\""));
    }

    #[test]
    fn test_results_empty_lists() {
        let html = results(&[], &[], "/outputs/x.png");
        assert!(html.contains("<p id=\"detected\" class=\"detected\">None</p>"));
        assert!(html.contains("<p id=\"not-detected\" class=\"not-detected\">None</p>"));
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("output_class 1.jpg"), "output_class%201.jpg");
        assert_eq!(encode_path_segment("a/b"), "a%2Fb");
        assert_eq!(encode_path_segment("ü"), "%C3%BC");
    }
}
