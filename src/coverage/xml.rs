use quick_xml::events::BytesStart;

use crate::errors::CovError;

pub(crate) fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, CovError> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

pub(crate) fn required_attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<String, CovError> {
    attribute(element, key)?.ok_or_else(|| {
        CovError::GeneralParsingError(format!(
            "Element <{}> is missing the \"{}\" attribute",
            String::from_utf8_lossy(element.name().as_ref()),
            String::from_utf8_lossy(key)
        ))
    })
}
