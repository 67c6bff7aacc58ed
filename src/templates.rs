//! Sample region templates for the demo document and for tests.
//!
//! Together they form a letter-style test page: a logo header, a body with
//! headings, a table and a list, and an address footer. Page numbers are
//! added by the footer widget, not by the template.

/// Header with company name and contact line.
pub fn header_template() -> &'static str {
    r##"
<div class="header-test" style="border-bottom: 1px solid #999; padding-bottom: 4mm">
    <h1 style="font-size: 16pt; margin: 0">Acme Corp</h1>
    <p style="font-size: 8pt; color: #555; margin: 0">123 Business St · New York, NY 10001 · acme.example</p>
</div>
"##
}

/// Body exercising headings, paragraphs, a table and a list.
pub fn body_template() -> &'static str {
    r##"
<div class="body-test">
    <h2>Test document</h2>
    <p>
        This document was generated to verify the PDF generator installation.
        If you can read this text, the body region was converted correctly.
    </p>

    <table>
        <tr><th style="text-align: left">Item</th><th style="text-align: left">Qty</th><th style="text-align: right">Price</th></tr>
        <tr><td>Web Development</td><td>40</td><td style="text-align: right">$6,000.00</td></tr>
        <tr><td>Design Services</td><td>20</td><td style="text-align: right">$2,500.00</td></tr>
        <tr><td>Hosting (Annual)</td><td>1</td><td style="text-align: right">$500.00</td></tr>
    </table>

    <h3>Checks</h3>
    <ul>
        <li>Header is repeated on every page</li>
        <li>Footer shows the page counter</li>
        <li>Margins match the document settings</li>
    </ul>
</div>
"##
}

/// Footer with bank details.
pub fn footer_template() -> &'static str {
    r##"
<div class="footer-test" style="border-top: 1px solid #999; font-size: 7pt; color: #555; padding-top: 2mm">
    Acme Corp · IBAN DE00 0000 0000 0000 0000 00 · VAT ID DE000000000
</div>
"##
}

/// Parameters used for the demo image export: flatten onto a white
/// background with a small border.
pub fn demo_image_params() -> Vec<String> {
    [
        "-background white",
        "-alpha remove",
        "-alpha off",
        "-bordercolor white",
        "-border 10",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
